//! The translation orchestration engine.
//!
//! Four cooperating pieces, all provider-agnostic:
//!
//! - [`session::ModelSession`] owns the model lifecycle: load, unload,
//!   reload, with progress notifications and cooperative cancellation.
//! - [`translator::Translator`] runs stateless translation passes: prompt
//!   assembly, chunk-stream consumption, stop-marker truncation.
//! - [`sanitize`] scrubs raw model output into the final string.
//! - [`cancel`] is the token/handle pair callers use to stop a load or a
//!   pass in flight.
//!
//! The engine reports everything through return values and the
//! [`session::ProgressSink`] hook; presentation state lives with the
//! caller.

pub mod cancel;
pub mod error;
pub(crate) mod prompt;
pub mod sanitize;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod translator;

pub use cancel::{CancellationHandle, CancellationToken};
pub use error::EngineError;
pub use session::{ModelSession, ProgressSink};
pub use translator::Translator;

/// Generation parameters, fixed at engine construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Layers offloaded to the GPU when loading.
    pub gpu_layers: u32,
    /// Context window requested at load; must be positive.
    pub context_size: u32,
    /// Hard per-pass token budget; must be positive.
    pub max_tokens: usize,
    /// Sampling temperature; 0 selects greedy decoding.
    pub temperature: f32,
    /// Nucleus sampling mass, in [0, 1].
    pub top_p: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            gpu_layers: 35,
            context_size: 4096,
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

//! The boundary between the engine and the LLM runtime.
//!
//! The engine never talks to `llama_cpp` directly. It loads models through
//! an [`InferenceProvider`] and runs passes against the opaque
//! [`LoadedModel`] handle it gets back; each pass yields an ordered, finite
//! stream of text chunks. Tests substitute a scripted provider at the same
//! seam.

pub mod llama;

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::Stream;

use crate::engine::{CancellationToken, EngineError};

/// Ordered chunk sequence from one generation pass. The producer stops
/// between chunks once the request's token is cancelled or the stream is
/// dropped; a consumed stream cannot be restarted.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, EngineError>> + Send>>;

/// Load-time knobs handed to the provider together with the model path.
#[derive(Debug, Clone)]
pub struct LoadParams {
    /// Layers offloaded to the GPU; 0 keeps everything on the CPU.
    pub gpu_layers: u32,
    /// Context window the model is expected to serve. Rejection is a load
    /// failure, not a generation failure.
    pub context_size: u32,
}

/// What the provider knows about a loaded model, for status display.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub architecture: Option<String>,
    pub path: PathBuf,
    pub context_size: u32,
    pub loaded_at: DateTime<Utc>,
}

/// Everything one stateless pass needs. A request carries its own seed and
/// cancellation token; nothing is shared with other passes.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub seed: u32,
    pub cancel: CancellationToken,
}

/// A loaded model. Weights are freed when the last handle clone drops.
pub trait LoadedModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    /// Starts one generation pass. Each call derives a fresh execution
    /// context; no state survives between calls.
    fn generate(&self, request: GenerationRequest) -> Result<ChunkStream, EngineError>;
}

/// Loads model files into runnable handles.
pub trait InferenceProvider: Send + Sync {
    fn load_model(
        &self,
        path: &Path,
        params: &LoadParams,
    ) -> Result<Arc<dyn LoadedModel>, EngineError>;
}

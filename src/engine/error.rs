use thiserror::Error;

/// Errors surfaced by the translation engine.
///
/// `Cancelled` is deliberately its own variant rather than a flavor of
/// failure: callers match on it to report "stopped by you" instead of an
/// error, and it never carries partial output.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The model file was missing or invalid, or the inference provider
    /// rejected the load parameters (context size, GPU offload).
    #[error("failed to load model: {0}")]
    Load(String),

    /// A translation was requested while no model is loaded.
    #[error("no model is loaded")]
    NotLoaded,

    /// The in-flight operation was cancelled through its token.
    #[error("operation cancelled")]
    Cancelled,

    /// The provider failed during generation. Not retried.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl EngineError {
    /// True for the caller-initiated cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

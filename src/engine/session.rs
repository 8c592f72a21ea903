//! Model lifecycle: the single slot holding the currently loaded model.
//!
//! The session is the only writer of the slot. Loads and unloads are
//! serialized by an async mutex; translations take read-only clones of the
//! handle and never mutate it. Loading while a model is held releases the
//! old model first, so at most one set of weights is resident.

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::engine::cancel::CancellationToken;
use crate::engine::error::EngineError;
use crate::provider::{InferenceProvider, LoadParams, LoadedModel, ModelInfo};

/// Receives human-readable status lines while a model loads. Implemented
/// for plain closures.
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Holds at most one loaded model and mediates every lifecycle change.
pub struct ModelSession {
    provider: Arc<dyn InferenceProvider>,
    slot: RwLock<Option<Arc<dyn LoadedModel>>>,
    /// One load or unload at a time.
    lifecycle: Mutex<()>,
}

impl ModelSession {
    pub fn new(provider: Arc<dyn InferenceProvider>) -> Self {
        ModelSession {
            provider,
            slot: RwLock::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    /// Loads the model at `path`, releasing any currently loaded model
    /// first.
    ///
    /// Progress is reported through `progress` when supplied. Cancellation
    /// is cooperative: the token is honored before the blocking load starts
    /// and again when it finishes; either way a cancelled load leaves the
    /// session unloaded.
    pub async fn load(
        &self,
        path: &Path,
        params: LoadParams,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<ModelInfo, EngineError> {
        let _lifecycle = self.lifecycle.lock().await;

        // Release before acquire, even when the load ends up cancelled.
        self.clear_slot();

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        if let Some(sink) = progress {
            sink.report("Loading model...");
        }
        info!(
            path = %path.display(),
            gpu_layers = params.gpu_layers,
            context_size = params.context_size,
            "loading model"
        );
        let started = Instant::now();

        let provider = Arc::clone(&self.provider);
        let load_path = path.to_path_buf();
        let handle =
            tokio::task::spawn_blocking(move || provider.load_model(&load_path, &params))
                .await
                .map_err(|e| EngineError::Load(format!("model load task failed: {}", e)))??;

        if cancel.is_cancelled() {
            // Too late to abort the load itself; discard the fresh model.
            drop(handle);
            warn!(path = %path.display(), "model load cancelled, releasing model");
            return Err(EngineError::Cancelled);
        }

        let model_info = handle.info().clone();
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(handle);
        } else {
            return Err(EngineError::Load("session state lock poisoned".to_string()));
        }

        if let Some(sink) = progress {
            sink.report("Model loaded successfully.");
        }
        info!(
            model = %model_info.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );
        Ok(model_info)
    }

    /// Releases the loaded model, if any. Idempotent.
    pub async fn unload(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.clear_slot();
    }

    /// Whether a model is currently loaded. Constant-time.
    pub fn is_loaded(&self) -> bool {
        self.slot.read().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Facts about the loaded model, for status display.
    pub fn model_info(&self) -> Option<ModelInfo> {
        self.slot
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(|model| model.info().clone()))
    }

    /// Read-only clone of the loaded handle for one translation pass.
    pub(crate) fn current(&self) -> Option<Arc<dyn LoadedModel>> {
        self.slot.read().ok().and_then(|slot| slot.clone())
    }

    fn clear_slot(&self) {
        let previous = self.slot.write().ok().and_then(|mut slot| slot.take());
        if let Some(model) = previous {
            info!(model = %model.info().name, "releasing loaded model");
            // Dropping the last handle frees the provider's resources.
            drop(model);
        }
    }
}

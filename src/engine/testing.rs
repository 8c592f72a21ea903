//! Scripted [`InferenceProvider`] used by the engine test suites.
//!
//! The fake records every prompt it is asked to complete, counts how many
//! model handles are alive, and keeps an ordered event log so tests can
//! assert that an old model is released before its replacement is acquired.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_stream::stream;
use chrono::Utc;

use crate::engine::cancel::CancellationHandle;
use crate::engine::error::EngineError;
use crate::provider::{
    ChunkStream, GenerationRequest, InferenceProvider, LoadParams, LoadedModel, ModelInfo,
};

/// Chunk sequence for one generation pass.
pub(crate) type Script = Vec<Result<String, EngineError>>;

#[derive(Default)]
pub(crate) struct FakeProvider {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    live_models: Arc<AtomicUsize>,
    events: Arc<Mutex<Vec<String>>>,
    cancel_mid_stream: Arc<Mutex<Option<(usize, CancellationHandle)>>>,
    cancel_during_load: Mutex<Option<CancellationHandle>>,
    failing_loads: Mutex<VecDeque<String>>,
}

impl FakeProvider {
    pub(crate) fn new() -> Arc<FakeProvider> {
        Arc::new(FakeProvider::default())
    }

    /// Queues the chunks the next generation pass will yield.
    pub(crate) fn push_script(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub(crate) fn push_text_script(&self, chunks: &[&str]) {
        self.push_script(chunks.iter().map(|c| Ok(c.to_string())).collect());
    }

    /// Makes the next load fail with the given message.
    pub(crate) fn fail_next_load(&self, message: &str) {
        self.failing_loads
            .lock()
            .unwrap()
            .push_back(message.to_string());
    }

    /// Arms the next pass to trip `handle` after yielding `chunks` chunks,
    /// as if the caller hit cancel mid-generation.
    pub(crate) fn cancel_after_chunks(&self, chunks: usize, handle: CancellationHandle) {
        *self.cancel_mid_stream.lock().unwrap() = Some((chunks, handle));
    }

    /// Arms the next load to trip `handle` while the load is running, as if
    /// the caller hit cancel too late to stop it.
    pub(crate) fn cancel_during_load(&self, handle: CancellationHandle) {
        *self.cancel_during_load.lock().unwrap() = Some(handle);
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn live_models(&self) -> usize {
        self.live_models.load(Ordering::SeqCst)
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl InferenceProvider for FakeProvider {
    fn load_model(
        &self,
        path: &Path,
        _params: &LoadParams,
    ) -> Result<Arc<dyn LoadedModel>, EngineError> {
        if let Some(message) = self.failing_loads.lock().unwrap().pop_front() {
            return Err(EngineError::Load(message));
        }
        if let Some(handle) = self.cancel_during_load.lock().unwrap().take() {
            handle.cancel();
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("model")
            .to_string();
        self.events.lock().unwrap().push(format!("acquire {name}"));
        self.live_models.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModel {
            info: ModelInfo {
                name,
                architecture: Some("fake".to_string()),
                path: path.to_path_buf(),
                context_size: 4096,
                loaded_at: Utc::now(),
            },
            scripts: Arc::clone(&self.scripts),
            prompts: Arc::clone(&self.prompts),
            cancel_mid_stream: Arc::clone(&self.cancel_mid_stream),
            live_models: Arc::clone(&self.live_models),
            events: Arc::clone(&self.events),
        }))
    }
}

pub(crate) struct FakeModel {
    info: ModelInfo,
    scripts: Arc<Mutex<VecDeque<Script>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    cancel_mid_stream: Arc<Mutex<Option<(usize, CancellationHandle)>>>,
    live_models: Arc<AtomicUsize>,
    events: Arc<Mutex<Vec<String>>>,
}

impl LoadedModel for FakeModel {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn generate(&self, request: GenerationRequest) -> Result<ChunkStream, EngineError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let chunks = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Ok("translated".to_string())]);
        let cancel_mid_stream = self.cancel_mid_stream.lock().unwrap().take();
        Ok(Box::pin(stream! {
            let mut yielded = 0usize;
            for chunk in chunks {
                if let Some((after, handle)) = &cancel_mid_stream {
                    if yielded == *after {
                        handle.cancel();
                    }
                }
                tokio::task::yield_now().await;
                yielded += 1;
                yield chunk;
            }
        }))
    }
}

impl Drop for FakeModel {
    fn drop(&mut self) {
        self.live_models.fetch_sub(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(format!("release {}", self.info.name));
    }
}

//! The `llama_cpp`-backed provider.
//!
//! Loading vets the file with the GGUF preflight, loads the weights, and
//! probes the configured context size once so a rejected configuration
//! fails at load time rather than mid-translation. Each generation pass
//! runs in a fresh `LlamaSession` on the blocking pool and forwards decoded
//! pieces over a channel; dropping the stream or cancelling the request
//! stops the loop between tokens.

use std::path::Path;
use std::sync::Arc;

use async_stream::stream;
use chrono::Utc;
use llama_cpp::standard_sampler::{SamplerStage, StandardSampler};
use llama_cpp::{LlamaModel, LlamaParams, SessionParams};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::EngineError;
use crate::gguf::GgufInfo;
use crate::provider::{
    ChunkStream, GenerationRequest, InferenceProvider, LoadParams, LoadedModel, ModelInfo,
};

const BATCH_SIZE: u32 = 512;

/// Loads GGUF models through `llama_cpp`.
#[derive(Debug, Default)]
pub struct LlamaCppProvider;

impl LlamaCppProvider {
    pub fn new() -> Self {
        LlamaCppProvider
    }
}

impl InferenceProvider for LlamaCppProvider {
    fn load_model(
        &self,
        path: &Path,
        params: &LoadParams,
    ) -> Result<Arc<dyn LoadedModel>, EngineError> {
        if !path.is_file() {
            return Err(EngineError::Load(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let header = GgufInfo::read(path)
            .map_err(|e| EngineError::Load(format!("{}: {}", path.display(), e)))?;

        let llama_params = LlamaParams {
            n_gpu_layers: params.gpu_layers,
            ..Default::default()
        };
        let model = LlamaModel::load_from_file(path, llama_params)
            .map_err(|e| EngineError::Load(format!("failed to load {}: {}", path.display(), e)))?;
        let model = Arc::new(model);

        // Probe the requested context size now; a KV cache that doesn't fit
        // should fail the load, not the first translation.
        let probe = model
            .create_session(session_params(params.context_size, 0))
            .map_err(|e| {
                EngineError::Load(format!(
                    "context size {} rejected: {}",
                    params.context_size, e
                ))
            })?;
        drop(probe);

        let name = header.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown model".to_string())
        });
        info!(
            model = %name,
            architecture = header.architecture.as_deref().unwrap_or("unknown"),
            gpu_layers = params.gpu_layers,
            "model ready"
        );

        Ok(Arc::new(LlamaCppModel {
            model,
            info: ModelInfo {
                name,
                architecture: header.architecture,
                path: path.to_path_buf(),
                context_size: params.context_size,
                loaded_at: Utc::now(),
            },
        }))
    }
}

struct LlamaCppModel {
    model: Arc<LlamaModel>,
    info: ModelInfo,
}

impl LoadedModel for LlamaCppModel {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn generate(&self, request: GenerationRequest) -> Result<ChunkStream, EngineError> {
        let model = Arc::clone(&self.model);
        let context_size = self.info.context_size;
        let (tx, mut rx) = mpsc::channel::<Result<String, EngineError>>(32);

        tokio::task::spawn_blocking(move || run_pass(model, context_size, request, tx));

        Ok(Box::pin(stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        }))
    }
}

fn session_params(context_size: u32, seed: u32) -> SessionParams {
    SessionParams {
        seed,
        n_ctx: context_size,
        n_batch: BATCH_SIZE,
        ..Default::default()
    }
}

/// One whole pass on the blocking pool: fresh session, prompt ingestion,
/// token loop. Errors are sent down the channel; a closed channel or a
/// cancelled token ends the loop.
fn run_pass(
    model: Arc<LlamaModel>,
    context_size: u32,
    request: GenerationRequest,
    tx: mpsc::Sender<Result<String, EngineError>>,
) {
    let GenerationRequest {
        prompt,
        max_tokens,
        temperature,
        top_p,
        seed,
        cancel,
    } = request;

    if cancel.is_cancelled() {
        return;
    }

    let mut session = match model.create_session(session_params(context_size, seed)) {
        Ok(session) => session,
        Err(e) => {
            let _ = tx.blocking_send(Err(EngineError::Inference(format!(
                "failed to create session: {}",
                e
            ))));
            return;
        }
    };

    if let Err(e) = session.advance_context(&prompt) {
        let _ = tx.blocking_send(Err(EngineError::Inference(format!(
            "failed to ingest prompt: {}",
            e
        ))));
        return;
    }

    if cancel.is_cancelled() {
        return;
    }

    let completions = match session.start_completing_with(sampler(temperature, top_p), max_tokens)
    {
        Ok(handle) => handle,
        Err(e) => {
            let _ = tx.blocking_send(Err(EngineError::Inference(format!(
                "failed to start completion: {}",
                e
            ))));
            return;
        }
    };

    let mut emitted = 0usize;
    for token in completions {
        if cancel.is_cancelled() {
            break;
        }
        let piece = model.token_to_piece(token);
        emitted += 1;
        if piece.is_empty() {
            continue;
        }
        if tx.blocking_send(Ok(piece)).is_err() {
            break;
        }
    }
    debug!(tokens = emitted, "generation pass ended");
}

/// Greedy when temperature is zero, otherwise nucleus + temperature in
/// llama.cpp's usual stage order.
fn sampler(temperature: f32, top_p: f32) -> StandardSampler {
    if temperature <= 0.0 {
        StandardSampler::new_greedy()
    } else {
        StandardSampler::new_softmax(
            vec![
                SamplerStage::TopP(top_p),
                SamplerStage::Temperature(temperature),
            ],
            1,
        )
    }
}

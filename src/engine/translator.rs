//! The orchestrator: one stateless translation pass per call.
//!
//! A pass builds its prompt from the flavor and target language, drives the
//! provider's chunk stream to completion, cuts the text at the first stop
//! marker, and hands the accumulation to the sanitizer. Nothing carries
//! over between passes; two calls with the same input, flavor, and
//! configuration send the provider byte-identical prompts.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::cancel::CancellationToken;
use crate::engine::error::EngineError;
use crate::engine::session::{ModelSession, ProgressSink};
use crate::engine::{prompt, sanitize, EngineConfig};
use crate::flavor::Flavor;
use crate::provider::{GenerationRequest, InferenceProvider, LoadParams, ModelInfo};

/// Drives translation passes against the session's loaded model.
pub struct Translator {
    session: ModelSession,
    config: EngineConfig,
}

impl Translator {
    /// Builds a translator with its own session on `provider`. The
    /// configuration is fixed for the translator's lifetime.
    pub fn new(provider: Arc<dyn InferenceProvider>, config: EngineConfig) -> Self {
        Translator {
            session: ModelSession::new(provider),
            config,
        }
    }

    /// Loads (or replaces) the model used by subsequent passes.
    pub async fn load_model(
        &self,
        path: &Path,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<ModelInfo, EngineError> {
        let params = LoadParams {
            gpu_layers: self.config.gpu_layers,
            context_size: self.config.context_size,
        };
        self.session.load(path, params, progress, cancel).await
    }

    /// Releases the loaded model. Idempotent.
    pub async fn unload(&self) {
        self.session.unload().await;
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_loaded()
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        self.session.model_info()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Translates `input` into `target_language` in the given flavor.
    ///
    /// Requires a loaded model. Empty or whitespace-only input returns an
    /// empty string without touching the provider. Cancelling mid-pass
    /// discards everything generated so far and returns
    /// [`EngineError::Cancelled`].
    pub async fn translate(
        &self,
        input: &str,
        target_language: &str,
        flavor: &Flavor,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        let Some(model) = self.session.current() else {
            return Err(EngineError::NotLoaded);
        };

        if input.trim().is_empty() {
            return Ok(String::new());
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let pass_id = Uuid::new_v4();
        let started = Instant::now();
        info!(
            %pass_id,
            target = target_language,
            flavor = %flavor.name,
            input_chars = input.chars().count(),
            "starting translation pass"
        );

        let request = GenerationRequest {
            prompt: prompt::build(flavor, target_language, input),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            seed: rand::random(),
            cancel: cancel.clone(),
        };

        let mut stream = model.generate(request)?;
        let mut text = String::new();

        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                warn!(%pass_id, "translation cancelled, discarding partial output");
                return Err(EngineError::Cancelled);
            }
            text.push_str(&chunk?);
            if let Some(pos) = prompt::find_stop_marker(&text) {
                debug!(%pass_id, at = pos, "stop marker reached");
                text.truncate(pos);
                break;
            }
        }

        if cancel.is_cancelled() {
            warn!(%pass_id, "translation cancelled, discarding partial output");
            return Err(EngineError::Cancelled);
        }

        let result = sanitize::clean(&text);
        info!(
            %pass_id,
            output_chars = result.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "translation pass finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeProvider;

    fn flavor() -> Flavor {
        Flavor {
            name: "Casual".to_string(),
            description: "Friendly, natural conversational tone".to_string(),
            system_prompt: "You are a translation assistant.".to_string(),
        }
    }

    async fn loaded_translator(provider: &Arc<FakeProvider>) -> Translator {
        let translator = Translator::new(
            Arc::clone(provider) as Arc<dyn InferenceProvider>,
            EngineConfig::default(),
        );
        let (token, _handle) = CancellationToken::new();
        translator
            .load_model(Path::new("/models/tiny.gguf"), None, &token)
            .await
            .unwrap();
        translator
    }

    #[tokio::test]
    async fn translating_without_a_model_is_rejected() {
        let provider = FakeProvider::new();
        let translator = Translator::new(
            Arc::clone(&provider) as Arc<dyn InferenceProvider>,
            EngineConfig::default(),
        );
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("Hello", "Spanish", &flavor(), &token)
            .await;
        assert!(matches!(result, Err(EngineError::NotLoaded)));

        // Even for input that would otherwise be a no-op.
        let result = translator.translate("   ", "Spanish", &flavor(), &token).await;
        assert!(matches!(result, Err(EngineError::NotLoaded)));
    }

    #[tokio::test]
    async fn blank_input_returns_empty_without_touching_the_provider() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("  \n\t  ", "Spanish", &flavor(), &token)
            .await
            .unwrap();

        assert_eq!(result, "");
        assert!(provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn prompt_carries_flavor_language_and_input() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        provider.push_text_script(&["Hola amigo"]);
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("Hello friend", "Spanish", &flavor(), &token)
            .await
            .unwrap();

        assert_eq!(result, "Hola amigo");
        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("<|im_start|>system\nYou are a translation assistant.<|im_end|>\n"));
        assert!(prompts[0].contains("Translate to Spanish. Preserve all meaning accurately.\n\nHello friend"));
        assert!(prompts[0].ends_with("<|im_start|>assistant\n"));
    }

    #[tokio::test]
    async fn repeated_calls_send_identical_prompts() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        provider.push_text_script(&["Hallo"]);
        provider.push_text_script(&["Hallo"]);
        let (token, _handle) = CancellationToken::new();

        translator
            .translate("Hello", "German", &flavor(), &token)
            .await
            .unwrap();
        translator
            .translate("Hello", "German", &flavor(), &token)
            .await
            .unwrap();

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn output_stops_at_the_first_stop_marker() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        provider.push_text_script(&["Hola", " amigo", "<|im_end|>leftover", "never pulled"]);
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("Hello friend", "Spanish", &flavor(), &token)
            .await
            .unwrap();

        assert_eq!(result, "Hola amigo");
    }

    #[tokio::test]
    async fn stop_marker_split_across_chunks_is_still_found() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        provider.push_text_script(&["Hola<|im_", "end|>rest"]);
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("Hello", "Spanish", &flavor(), &token)
            .await
            .unwrap();

        assert_eq!(result, "Hola");
    }

    #[tokio::test]
    async fn conversational_continuation_is_cut_off() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        provider.push_text_script(&["Hola.\n", "User: what about", " another one?"]);
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("Hello.", "Spanish", &flavor(), &token)
            .await
            .unwrap();

        assert_eq!(result, "Hola.");
    }

    #[tokio::test]
    async fn marker_only_output_yields_empty() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        provider.push_text_script(&["<|im_end|>"]);
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("Hello", "Spanish", &flavor(), &token)
            .await
            .unwrap();

        assert_eq!(result, "");
    }

    #[tokio::test]
    async fn cancelling_mid_pass_discards_partial_output() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        let (token, handle) = CancellationToken::new();
        provider.cancel_after_chunks(1, handle);
        provider.push_text_script(&["Hola", " amigo", " para siempre"]);

        let result = translator
            .translate("Hello friend forever", "Spanish", &flavor(), &token)
            .await;

        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[tokio::test]
    async fn pre_cancelled_pass_never_reaches_the_provider() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        let (token, handle) = CancellationToken::new();
        handle.cancel();

        let result = translator
            .translate("Hello", "Spanish", &flavor(), &token)
            .await;

        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(provider.prompts().is_empty());
    }

    #[tokio::test]
    async fn cancelling_the_pass_in_flight_lets_the_next_one_proceed() {
        let provider = FakeProvider::new();
        let translator = Arc::new(loaded_translator(&provider).await);

        provider.push_text_script(&["Lo", " siento", " mucho", " de", " verdad"]);
        let (token_a, handle_a) = CancellationToken::new();
        let task_translator = Arc::clone(&translator);
        let pass_a = tokio::spawn(async move {
            task_translator
                .translate("I am very sorry", "Spanish", &flavor(), &token_a)
                .await
        });

        // Let pass A reach the provider before cancelling it.
        while provider.prompts().is_empty() {
            tokio::task::yield_now().await;
        }
        handle_a.cancel();

        provider.push_text_script(&["Es tut mir leid"]);
        let (token_b, _handle_b) = CancellationToken::new();
        let result_b = translator
            .translate("I am sorry", "German", &flavor(), &token_b)
            .await
            .unwrap();
        let result_a = pass_a.await.unwrap();

        assert!(matches!(result_a, Err(EngineError::Cancelled)));
        assert_eq!(result_b, "Es tut mir leid");
    }

    #[tokio::test]
    async fn pass_after_a_cancelled_one_is_unaffected() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;

        let (token, handle) = CancellationToken::new();
        provider.cancel_after_chunks(0, handle);
        provider.push_text_script(&["ignored"]);
        let cancelled = translator
            .translate("Hello", "Spanish", &flavor(), &token)
            .await;
        assert!(matches!(cancelled, Err(EngineError::Cancelled)));

        provider.push_text_script(&["Bonjour"]);
        let (token, _handle) = CancellationToken::new();
        let result = translator
            .translate("Hello", "French", &flavor(), &token)
            .await
            .unwrap();

        assert_eq!(result, "Bonjour");
        let prompts = provider.prompts();
        assert!(prompts.last().unwrap().contains("Translate to French."));
    }

    #[tokio::test]
    async fn provider_error_mid_stream_surfaces_as_inference_error() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        provider.push_script(vec![
            Ok("Hola".to_string()),
            Err(EngineError::Inference("backend exploded".to_string())),
        ]);
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("Hello", "Spanish", &flavor(), &token)
            .await;

        match result {
            Err(EngineError::Inference(message)) => assert!(message.contains("backend exploded")),
            other => panic!("expected an inference error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn raw_output_is_sanitized() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        provider.push_text_script(&["Assistant: \"Hola, amigo\"  "]);
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("Hello, friend", "Spanish", &flavor(), &token)
            .await
            .unwrap();

        assert_eq!(result, "Hola, amigo");
    }

    #[tokio::test]
    async fn unload_then_translate_reports_not_loaded() {
        let provider = FakeProvider::new();
        let translator = loaded_translator(&provider).await;
        translator.unload().await;
        let (token, _handle) = CancellationToken::new();

        let result = translator
            .translate("Hello", "Spanish", &flavor(), &token)
            .await;

        assert!(matches!(result, Err(EngineError::NotLoaded)));
        assert_eq!(provider.live_models(), 0);
    }
}

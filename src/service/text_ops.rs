use crate::core::TextGenerationClient;
use crate::error::{GenerationError, PromptError, ServiceError};
use crate::prompts::{params, PromptCatalog, PromptKind, PromptParams};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_LANGUAGE: &str = "English";
pub const DEFAULT_SOURCE_LANGUAGE: &str = "English";
pub const DEFAULT_TARGET_LANGUAGE: &str = "Spanish";

/// One-shot text transformations: a template, one generation call, no history.
pub struct TextOps {
    client: Arc<dyn TextGenerationClient>,
    prompts: Arc<PromptCatalog>,
    generation_timeout: Duration,
}

impl TextOps {
    pub fn new(
        client: Arc<dyn TextGenerationClient>,
        prompts: Arc<PromptCatalog>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            client,
            prompts,
            generation_timeout,
        }
    }

    pub async fn check_grammar(&self, text: &str, language: &str) -> Result<String, ServiceError> {
        self.run(PromptKind::Grammar, params([("text", text), ("language", language)]))
            .await
    }

    pub async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ServiceError> {
        self.run(
            PromptKind::Translate,
            params([
                ("text", text),
                ("source_language", source_language),
                ("target_language", target_language),
            ]),
        )
        .await
    }

    pub async fn summarize(&self, text: &str, language: &str) -> Result<String, ServiceError> {
        self.run(PromptKind::Summarize, params([("text", text), ("language", language)]))
            .await
    }

    pub async fn paraphrase(&self, text: &str, language: &str) -> Result<String, ServiceError> {
        self.run(PromptKind::Paraphrase, params([("text", text), ("language", language)]))
            .await
    }

    /// Resolve `kind` with `params` and return the extracted reply text.
    ///
    /// The conversation kind has no fixed user message and is rejected
    /// here; it only makes sense with a thread history.
    pub async fn run(
        &self,
        kind: PromptKind,
        params: PromptParams,
    ) -> Result<String, ServiceError> {
        let prompt = self.prompts.resolve(kind, &params)?;
        let Some(user_message) = prompt.user_message else {
            return Err(PromptError::RequiresHistory(kind).into());
        };

        let output = tokio::time::timeout(
            self.generation_timeout,
            self.client.generate(&prompt.system, &[], &user_message),
        )
        .await
        .map_err(|_| GenerationError::Timeout(self.generation_timeout))?
        .inspect_err(|e| tracing::error!("[TextOps] {} generation failed: {}", kind, e))?;

        Ok(output.into_text())
    }
}

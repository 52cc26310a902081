use crate::config::LlmConfig;
use crate::core::content::GenerationOutput;
use crate::error::GenerationError;
use crate::session::Turn;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote text generation, one request per call.
///
/// Implementations must not retry internally; wrap them in a
/// [`RetryingClient`] when a retry budget is wanted.
#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        history: &[Turn],
        user_text: &str,
    ) -> Result<GenerationOutput, GenerationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self::new(turn.role.as_str(), turn.content.clone())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: GenerationOutput,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (Groq, OpenAI, ...)
pub struct ChatCompletionsClient {
    client: Client,
    api_key: String,
    settings: LlmConfig,
}

impl ChatCompletionsClient {
    pub fn new(api_key: String, settings: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            settings,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// System instruction first, then the prior turns, then the new user text.
    pub fn build_messages(system: &str, history: &[Turn], user_text: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new("system", system));
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::new("user", user_text));
        messages
    }
}

#[async_trait]
impl TextGenerationClient for ChatCompletionsClient {
    async fn generate(
        &self,
        system: &str,
        history: &[Turn],
        user_text: &str,
    ) -> Result<GenerationOutput, GenerationError> {
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: Self::build_messages(system, history, user_text),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            stream: false,
        };

        tracing::debug!(
            "[ChatCompletionsClient] Sending {} messages to {}",
            request.messages.len(),
            self.settings.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("[ChatCompletionsClient] API returned {}: {}", status, body);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("response has no choices".to_string()))
    }
}

/// Retries transient failures of the wrapped client with exponential backoff
pub struct RetryingClient<C> {
    inner: C,
    max_retries: u32,
    base_delay: Duration,
}

impl<C: TextGenerationClient> RetryingClient<C> {
    pub fn new(inner: C, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_millis(1000),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

#[async_trait]
impl<C: TextGenerationClient> TextGenerationClient for RetryingClient<C> {
    async fn generate(
        &self,
        system: &str,
        history: &[Turn],
        user_text: &str,
    ) -> Result<GenerationOutput, GenerationError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(system, history, user_text).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.base_delay * 2_u32.pow(attempt - 1);
                    tracing::warn!(
                        "[RetryingClient] {} - retrying (attempt {}/{}) after {:?}",
                        e,
                        attempt + 1,
                        self.max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

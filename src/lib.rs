//! Lingualand - conversation sessions for a language-learning assistant
//!
//! Maps each (user, language) pair to a durable, independently threaded
//! dialogue, feeds that history plus a tutor prompt to a hosted LLM, and
//! offers one-shot grammar, translation, summary and paraphrase helpers.

pub mod config;
pub mod core;
pub mod error;
pub mod persistence;
pub mod prompts;
pub mod service;
pub mod session;
pub mod storage;
pub mod utils;

pub mod cli;

pub use config::Settings;
pub use error::{CheckpointError, GenerationError, PersistenceError, PromptError, ServiceError};
pub use service::{ConversationService, ConverseReply, PendingExchange, TextOps};

use crate::core::{ChatCompletionsClient, RetryingClient, TextGenerationClient};
use crate::persistence::{ConversationRepository, SqliteRepository};
use crate::prompts::PromptCatalog;
use crate::session::ConversationSessionStore;
use crate::storage::{Checkpointer, FileSystemCheckpointer, InMemoryCheckpointer};
use std::sync::Arc;
use std::time::Duration;

/// Process-wide components, built once at startup and passed down
pub struct System {
    pub conversations: ConversationService,
    pub text_ops: TextOps,
}

impl System {
    /// Wire the production stack described by `settings`.
    pub async fn from_settings(settings: &Settings, api_key: String) -> anyhow::Result<Self> {
        let client = RetryingClient::new(
            ChatCompletionsClient::new(api_key, settings.llm.clone()),
            settings.llm.max_retries,
        );

        let repository = if settings.storage.database_path == ":memory:" {
            SqliteRepository::open_in_memory()?
        } else {
            SqliteRepository::open(&settings.storage.database_path)?
        };

        let checkpointer: Arc<dyn Checkpointer> = match &settings.storage.checkpoint_dir {
            Some(dir) => Arc::new(FileSystemCheckpointer::new(dir.clone()).await?),
            None => Arc::new(InMemoryCheckpointer::new()),
        };

        tracing::info!(
            "Lingualand initialized (model: {}, database: {})",
            settings.llm.model,
            settings.storage.database_path
        );

        Ok(Self::with_components(
            Arc::new(client),
            Arc::new(repository),
            checkpointer,
            settings.llm.timeout(),
        ))
    }

    /// Wire arbitrary collaborators, e.g. fakes in tests.
    pub fn with_components(
        client: Arc<dyn TextGenerationClient>,
        repository: Arc<dyn ConversationRepository>,
        checkpointer: Arc<dyn Checkpointer>,
        generation_timeout: Duration,
    ) -> Self {
        let prompts = Arc::new(PromptCatalog::new());
        let sessions = Arc::new(ConversationSessionStore::with_checkpointer(checkpointer));

        Self {
            conversations: ConversationService::new(
                Arc::clone(&client),
                sessions,
                repository,
                Arc::clone(&prompts),
                generation_timeout,
            ),
            text_ops: TextOps::new(client, prompts, generation_timeout),
        }
    }
}

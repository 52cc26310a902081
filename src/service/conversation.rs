//! Conversation Service
//!
//! Information Hiding:
//! - Thread resolution, rehydration and locking hidden behind `converse`
//! - Callers see replies and typed failures, never session internals
//!
//! Flow of one exchange: resolve the thread for (user, language), lease
//! it, generate a reply from the conversation prompt plus the leased
//! history, commit user and assistant turns together, then persist them
//! while still holding the lease so durable order matches memory order.

use crate::core::TextGenerationClient;
use crate::error::{GenerationError, PersistenceError, ServiceError};
use crate::persistence::{
    default_title, ConversationRecord, ConversationRepository, StoredMessage, ThreadId,
};
use crate::prompts::{params, PromptCatalog, PromptKind};
use crate::session::{ConversationSessionStore, Role, ThreadLease, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverseReply {
    pub reply: String,
    pub thread_id: ThreadId,
}

/// An exchange that is in the live session but not yet durable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingExchange {
    pub thread_id: ThreadId,
    pub user_text: String,
    pub reply_text: String,
}

impl PendingExchange {
    fn messages(&self) -> [(Role, String); 2] {
        [
            (Role::User, self.user_text.clone()),
            (Role::Assistant, self.reply_text.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub conversation: ConversationRecord,
    pub messages: Vec<StoredMessage>,
}

pub struct ConversationService {
    client: Arc<dyn TextGenerationClient>,
    sessions: Arc<ConversationSessionStore>,
    repository: Arc<dyn ConversationRepository>,
    prompts: Arc<PromptCatalog>,
    generation_timeout: Duration,
}

impl ConversationService {
    pub fn new(
        client: Arc<dyn TextGenerationClient>,
        sessions: Arc<ConversationSessionStore>,
        repository: Arc<dyn ConversationRepository>,
        prompts: Arc<PromptCatalog>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            client,
            sessions,
            repository,
            prompts,
            generation_timeout,
        }
    }

    pub fn sessions(&self) -> &ConversationSessionStore {
        &self.sessions
    }

    /// Send one user message in the (user, language) conversation and return the reply.
    ///
    /// On `Generation` failure no turn is recorded anywhere. On
    /// `Persistence` failure the exchange is in the live session and the
    /// error carries the reply plus a `PendingExchange` for `retry_persist`.
    ///
    /// A failure to load durable history for a thread this process has not
    /// seen yet is a `Storage` error raised before generation.
    pub async fn converse(
        &self,
        user_id: &str,
        language: &str,
        text: &str,
    ) -> Result<ConverseReply, ServiceError> {
        let prompt = self
            .prompts
            .resolve(PromptKind::Conversation, &params([("language", language)]))?;
        let thread_id = self.repository.find_or_create_thread(user_id, language).await?;

        let mut lease = self.checkout_rehydrated(&thread_id).await?;

        tracing::debug!(
            "[ConversationService] Thread {} ({} turns) <- user '{}' in {}",
            thread_id,
            lease.len(),
            user_id,
            language
        );

        let generation = tokio::time::timeout(
            self.generation_timeout,
            self.client.generate(&prompt.system, lease.history(), text),
        )
        .await;

        let output = match generation {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::error!(
                    "[ConversationService] Generation failed for thread {}: {}",
                    thread_id,
                    e
                );
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!(
                    "[ConversationService] Generation timed out after {:?} for thread {}",
                    self.generation_timeout,
                    thread_id
                );
                return Err(GenerationError::Timeout(self.generation_timeout).into());
            }
        };
        let reply = output.into_text();

        let checkpointed = lease
            .commit_exchange(Turn::user(text), Turn::assistant(reply.clone()))
            .await;

        let pending = PendingExchange {
            thread_id: thread_id.clone(),
            user_text: text.to_string(),
            reply_text: reply.clone(),
        };
        let persisted = self
            .repository
            .append_messages(&thread_id, &pending.messages())
            .await;
        drop(lease);

        let durability = persisted
            .err()
            .or_else(|| checkpointed.err().map(PersistenceError::from));

        let result = ConverseReply { reply, thread_id };
        match durability {
            None => Ok(result),
            Some(source) => {
                tracing::error!(
                    "[ConversationService] Reply for thread {} not saved: {}",
                    result.thread_id,
                    source
                );
                Err(ServiceError::Persistence {
                    reply: Box::new(result),
                    pending: Box::new(pending),
                    source,
                })
            }
        }
    }

    /// Persist an exchange whose durable write failed earlier. Generation
    /// is not repeated.
    pub async fn retry_persist(&self, pending: &PendingExchange) -> Result<(), ServiceError> {
        self.repository
            .append_messages(&pending.thread_id, &pending.messages())
            .await?;
        tracing::info!(
            "[ConversationService] Persisted pending exchange for thread {}",
            pending.thread_id
        );
        Ok(())
    }

    /// Replace the (user, language) conversation with an empty one.
    pub async fn start_new_conversation(
        &self,
        user_id: &str,
        language: &str,
        title: Option<&str>,
    ) -> Result<ThreadId, ServiceError> {
        if let Some(old) = self.repository.delete_thread(user_id, language).await? {
            self.drop_session(&old).await;
        }

        let title = title.map(str::to_string).unwrap_or_else(|| default_title(language));
        let thread_id = self.repository.create_thread(user_id, language, &title).await?;
        // a repository may hand out a previously used id
        self.drop_session(&thread_id).await;

        tracing::info!(
            "[ConversationService] Started thread {} for user '{}' ({})",
            thread_id,
            user_id,
            language
        );
        Ok(thread_id)
    }

    /// Durable history for the pair; `None` when no conversation exists.
    pub async fn history(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<Option<ConversationHistory>, ServiceError> {
        let Some(conversation) = self.repository.get_conversation(user_id, language).await? else {
            return Ok(None);
        };
        let messages = self.repository.list_messages(&conversation.thread_id).await?;
        Ok(Some(ConversationHistory {
            conversation,
            messages,
        }))
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationRecord>, ServiceError> {
        Ok(self.repository.list_conversations(user_id).await?)
    }

    /// Returns false when there was nothing to delete.
    pub async fn delete_conversation(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<bool, ServiceError> {
        match self.repository.delete_thread(user_id, language).await? {
            Some(old) => {
                self.drop_session(&old).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn rename_conversation(
        &self,
        user_id: &str,
        language: &str,
        title: &str,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .repository
            .rename_conversation(user_id, language, title)
            .await?)
    }

    /// Live history of the pair's thread, loaded from durable storage when
    /// this process has not touched the thread yet. Empty when the pair has
    /// no conversation.
    pub async fn session_history(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<Vec<Turn>, ServiceError> {
        let Some(conversation) = self.repository.get_conversation(user_id, language).await? else {
            return Ok(Vec::new());
        };
        let lease = self.checkout_rehydrated(&conversation.thread_id).await?;
        Ok(lease.history().to_vec())
    }

    /// Lease a thread, seeding it from durable storage on first use. On a
    /// read failure the slot stays unseeded so the next call tries again.
    async fn checkout_rehydrated(&self, thread_id: &str) -> Result<ThreadLease, ServiceError> {
        let mut lease = self.sessions.checkout(thread_id).await;
        if lease.needs_rehydration() {
            let messages = self
                .repository
                .list_messages(thread_id)
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        "[ConversationService] Could not load history for thread {}: {}",
                        thread_id,
                        e
                    );
                })?;
            lease.rehydrate(messages.into_iter().map(Turn::from).collect());
        }
        Ok(lease)
    }

    async fn drop_session(&self, thread_id: &str) {
        // the id is retired either way; a leftover snapshot is never restored
        if let Err(e) = self.sessions.drop_thread(thread_id).await {
            tracing::warn!(
                "[ConversationService] Checkpoint cleanup failed for thread {}: {}",
                thread_id,
                e
            );
        }
    }
}

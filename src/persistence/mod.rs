//! Durable Conversation Records
//!
//! Information Hiding:
//! - Schema, SQL and identifier allocation hidden behind `ConversationRepository`
//! - The one-conversation-per-(user, language) rule is enforced here, not in the session store
//! - Thread ids are never recycled, so a new conversation cannot inherit deleted history

use crate::error::PersistenceError;
use crate::session::{Role, Turn};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

pub type ThreadId = String;

/// Durable mapping of (user, language) to a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub thread_id: ThreadId,
    pub user_id: String,
    pub language: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub thread_id: ThreadId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredMessage> for Turn {
    fn from(message: StoredMessage) -> Self {
        Turn {
            role: message.role,
            content: message.content,
            created_at: message.created_at,
        }
    }
}

pub fn default_title(language: &str) -> String {
    format!("{} Conversation", language)
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Return the live thread for the pair, creating it when absent.
    /// Reuse refreshes `updated_at`.
    async fn find_or_create_thread(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<ThreadId, PersistenceError>;

    /// Create a thread with an explicit title. Replaces nothing: callers
    /// delete the previous one first.
    async fn create_thread(
        &self,
        user_id: &str,
        language: &str,
        title: &str,
    ) -> Result<ThreadId, PersistenceError>;

    /// Remove the pair's thread and its messages, returning the old id.
    async fn delete_thread(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<Option<ThreadId>, PersistenceError>;

    /// Fails with `ThreadNotFound` when the thread does not exist.
    async fn append_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), PersistenceError>;

    /// All-or-nothing variant of `append_message`.
    async fn append_messages(
        &self,
        thread_id: &str,
        messages: &[(Role, String)],
    ) -> Result<(), PersistenceError>;

    async fn get_conversation(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<Option<ConversationRecord>, PersistenceError>;

    /// Most recently updated first.
    async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationRecord>, PersistenceError>;

    /// Oldest first; empty for unknown threads.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<StoredMessage>, PersistenceError>;

    /// Returns false when the pair has no conversation.
    async fn rename_conversation(
        &self,
        user_id: &str,
        language: &str,
        title: &str,
    ) -> Result<bool, PersistenceError>;
}

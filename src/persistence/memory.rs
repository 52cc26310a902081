//! In-Memory Repository
//!
//! Same contract as the SQLite repository, kept in a mutex-guarded map.
//! Identifiers come from a counter that only grows.

use super::{default_title, ConversationRecord, ConversationRepository, StoredMessage, ThreadId};
use crate::error::PersistenceError;
use crate::session::Role;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    next_thread_id: u64,
    next_message_id: i64,
    /// (user_id, language) -> record
    conversations: HashMap<(String, String), ConversationRecord>,
    messages: HashMap<ThreadId, Vec<StoredMessage>>,
}

impl Inner {
    fn insert_thread(&mut self, user_id: &str, language: &str, title: &str) -> ThreadId {
        self.next_thread_id += 1;
        let thread_id = self.next_thread_id.to_string();
        let now = Utc::now();

        self.conversations.insert(
            (user_id.to_string(), language.to_string()),
            ConversationRecord {
                thread_id: thread_id.clone(),
                user_id: user_id.to_string(),
                language: language.to_string(),
                title: title.to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        self.messages.insert(thread_id.clone(), Vec::new());
        thread_id
    }

    fn record_for_thread(&mut self, thread_id: &str) -> Option<&mut ConversationRecord> {
        self.conversations
            .values_mut()
            .find(|record| record.thread_id == thread_id)
    }
}

pub struct InMemoryRepository {
    inner: Mutex<Inner>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryRepository {
    async fn find_or_create_thread(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<ThreadId, PersistenceError> {
        let mut inner = self.inner.lock().await;
        let key = (user_id.to_string(), language.to_string());

        if let Some(record) = inner.conversations.get_mut(&key) {
            record.updated_at = Utc::now();
            return Ok(record.thread_id.clone());
        }

        let thread_id = inner.insert_thread(user_id, language, &default_title(language));
        tracing::info!(
            "[InMemoryRepository] Created thread {} for user '{}' ({})",
            thread_id,
            user_id,
            language
        );
        Ok(thread_id)
    }

    async fn create_thread(
        &self,
        user_id: &str,
        language: &str,
        title: &str,
    ) -> Result<ThreadId, PersistenceError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner
            .conversations
            .get(&(user_id.to_string(), language.to_string()))
        {
            // unique (user, language): stale thread goes away with its messages
            let stale = existing.thread_id.clone();
            inner.messages.remove(&stale);
        }
        Ok(inner.insert_thread(user_id, language, title))
    }

    async fn delete_thread(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<Option<ThreadId>, PersistenceError> {
        let mut inner = self.inner.lock().await;
        let removed = inner
            .conversations
            .remove(&(user_id.to_string(), language.to_string()));

        Ok(removed.map(|record| {
            inner.messages.remove(&record.thread_id);
            record.thread_id
        }))
    }

    async fn append_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), PersistenceError> {
        self.append_messages(thread_id, &[(role, content.to_string())])
            .await
    }

    async fn append_messages(
        &self,
        thread_id: &str,
        messages: &[(Role, String)],
    ) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        match inner.record_for_thread(thread_id) {
            Some(record) => record.updated_at = now,
            None => return Err(PersistenceError::ThreadNotFound(thread_id.to_string())),
        }

        let first_id = inner.next_message_id + 1;
        inner.next_message_id += messages.len() as i64;

        let stored = inner.messages.entry(thread_id.to_string()).or_default();
        for (offset, (role, content)) in messages.iter().enumerate() {
            stored.push(StoredMessage {
                id: first_id + offset as i64,
                thread_id: thread_id.to_string(),
                role: *role,
                content: content.clone(),
                created_at: now,
            });
        }
        Ok(())
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<Option<ConversationRecord>, PersistenceError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .conversations
            .get(&(user_id.to_string(), language.to_string()))
            .cloned())
    }

    async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationRecord>, PersistenceError> {
        let inner = self.inner.lock().await;
        let mut records: Vec<ConversationRecord> = inner
            .conversations
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.thread_id.cmp(&a.thread_id))
        });
        Ok(records)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<StoredMessage>, PersistenceError> {
        let inner = self.inner.lock().await;
        Ok(inner.messages.get(thread_id).cloned().unwrap_or_default())
    }

    async fn rename_conversation(
        &self,
        user_id: &str,
        language: &str,
        title: &str,
    ) -> Result<bool, PersistenceError> {
        let mut inner = self.inner.lock().await;
        match inner
            .conversations
            .get_mut(&(user_id.to_string(), language.to_string()))
        {
            Some(record) => {
                record.title = title.to_string();
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_or_create_reuses_thread() {
        let repo = InMemoryRepository::new();
        let first = repo.find_or_create_thread("u1", "French").await.unwrap();
        let second = repo.find_or_create_thread("u1", "French").await.unwrap();
        let other = repo.find_or_create_thread("u1", "German").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);

        let record = repo.get_conversation("u1", "French").await.unwrap().unwrap();
        assert_eq!(record.title, "French Conversation");
    }

    #[tokio::test]
    async fn test_recreated_thread_never_reuses_id() {
        let repo = InMemoryRepository::new();
        let old = repo.find_or_create_thread("u1", "French").await.unwrap();
        repo.append_message(&old, Role::User, "Bonjour").await.unwrap();

        assert_eq!(repo.delete_thread("u1", "French").await.unwrap(), Some(old.clone()));
        let new = repo.create_thread("u1", "French", "Round two").await.unwrap();

        assert_ne!(old, new);
        assert!(repo.list_messages(&new).await.unwrap().is_empty());
        assert!(repo.list_messages(&old).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_to_unknown_thread_fails() {
        let repo = InMemoryRepository::new();
        let err = repo.append_message("404", Role::User, "hi").await.unwrap_err();
        assert!(matches!(err, PersistenceError::ThreadNotFound(ref id) if id == "404"));
    }

    #[tokio::test]
    async fn test_messages_keep_order() {
        let repo = InMemoryRepository::new();
        let thread = repo.find_or_create_thread("u", "Spanish").await.unwrap();
        repo.append_messages(
            &thread,
            &[(Role::User, "Hola".to_string()), (Role::Assistant, "¡Hola!".to_string())],
        )
        .await
        .unwrap();
        repo.append_message(&thread, Role::User, "¿Qué tal?").await.unwrap();

        let messages = repo.list_messages(&thread).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Hola", "¡Hola!", "¿Qué tal?"]);
        assert!(messages.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[tokio::test]
    async fn test_rename_and_list() {
        let repo = InMemoryRepository::new();
        repo.find_or_create_thread("u", "Spanish").await.unwrap();
        repo.find_or_create_thread("u", "Italian").await.unwrap();
        repo.find_or_create_thread("someone-else", "Italian").await.unwrap();

        assert!(repo.rename_conversation("u", "Spanish", "Viaje").await.unwrap());
        assert!(!repo.rename_conversation("u", "Korean", "x").await.unwrap());

        let listed = repo.list_conversations("u").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "Viaje");
    }
}

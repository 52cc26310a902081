//! SQLite Repository
//!
//! Information Hiding:
//! - Schema and SQL stay in this file
//! - The blocking rusqlite connection runs on tokio's blocking pool
//! - AUTOINCREMENT ids make thread ids unique for the life of the database

use super::{default_title, ConversationRecord, ConversationRepository, StoredMessage, ThreadId};
use crate::error::PersistenceError;
use crate::session::Role;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS conversations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT NOT NULL,
    language    TEXT NOT NULL,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (user_id, language)
);

CREATE TABLE IF NOT EXISTS messages (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id  INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    role             TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content          TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, id);
";

pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, PersistenceError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, PersistenceError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| PersistenceError::LockPoisoned)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| PersistenceError::Task(e.to_string()))?
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

/// Thread ids are the decimal rowid; anything else cannot exist.
fn parse_thread_id(thread_id: &str) -> Option<i64> {
    thread_id.parse::<i64>().ok().filter(|id| *id > 0)
}

struct RawConversation {
    id: i64,
    user_id: String,
    language: String,
    title: String,
    created_at: String,
    updated_at: String,
}

impl RawConversation {
    const COLUMNS: &'static str = "id, user_id, language, title, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            language: row.get(2)?,
            title: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<ConversationRecord, PersistenceError> {
        Ok(ConversationRecord {
            thread_id: self.id.to_string(),
            user_id: self.user_id,
            language: self.language,
            title: self.title,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

fn insert_conversation(
    conn: &Connection,
    user_id: &str,
    language: &str,
    title: &str,
) -> Result<i64, PersistenceError> {
    let stamp = now();
    conn.execute(
        "INSERT INTO conversations (user_id, language, title, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![user_id, language, title, stamp],
    )?;
    Ok(conn.last_insert_rowid())
}

#[async_trait]
impl ConversationRepository for SqliteRepository {
    async fn find_or_create_thread(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<ThreadId, PersistenceError> {
        let (user_id, language) = (user_id.to_string(), language.to_string());

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM conversations WHERE user_id = ?1 AND language = ?2",
                    params![user_id, language],
                    |row| row.get(0),
                )
                .optional()?;

            let id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                        params![now(), id],
                    )?;
                    id
                }
                None => {
                    let title = default_title(&language);
                    let id = insert_conversation(&tx, &user_id, &language, &title)?;
                    tracing::info!(
                        "[SqliteRepository] Created thread {} for user '{}' ({})",
                        id,
                        user_id,
                        language
                    );
                    id
                }
            };
            tx.commit()?;
            Ok(id.to_string())
        })
        .await
    }

    async fn create_thread(
        &self,
        user_id: &str,
        language: &str,
        title: &str,
    ) -> Result<ThreadId, PersistenceError> {
        let (user_id, language, title) =
            (user_id.to_string(), language.to_string(), title.to_string());

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM conversations WHERE user_id = ?1 AND language = ?2",
                params![user_id, language],
            )?;
            let id = insert_conversation(&tx, &user_id, &language, &title)?;
            tx.commit()?;
            Ok(id.to_string())
        })
        .await
    }

    async fn delete_thread(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<Option<ThreadId>, PersistenceError> {
        let (user_id, language) = (user_id.to_string(), language.to_string());

        self.with_conn(move |conn| {
            let deleted: Option<i64> = conn
                .query_row(
                    "DELETE FROM conversations WHERE user_id = ?1 AND language = ?2 RETURNING id",
                    params![user_id, language],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(deleted.map(|id| id.to_string()))
        })
        .await
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
        let raw_id = thread_id.to_string();
        let messages = messages.to_vec();

        self.with_conn(move |conn| {
            let id = parse_thread_id(&raw_id)
                .ok_or_else(|| PersistenceError::ThreadNotFound(raw_id.clone()))?;
            let tx = conn.transaction()?;
            let stamp = now();

            let touched = tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![stamp, id],
            )?;
            if touched == 0 {
                return Err(PersistenceError::ThreadNotFound(raw_id));
            }

            {
                let mut insert = tx.prepare(
                    "INSERT INTO messages (conversation_id, role, content, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (role, content) in &messages {
                    insert.execute(params![id, role.as_str(), content, stamp])?;
                }
            }
            tx.commit()?;

            tracing::debug!(
                "[SqliteRepository] Stored {} messages for thread {}",
                messages.len(),
                id
            );
            Ok(())
        })
        .await
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        language: &str,
    ) -> Result<Option<ConversationRecord>, PersistenceError> {
        let (user_id, language) = (user_id.to_string(), language.to_string());

        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM conversations WHERE user_id = ?1 AND language = ?2",
                RawConversation::COLUMNS
            );
            conn.query_row(&sql, params![user_id, language], RawConversation::from_row)
                .optional()?
                .map(RawConversation::into_record)
                .transpose()
        })
        .await
    }

    async fn list_conversations(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConversationRecord>, PersistenceError> {
        let user_id = user_id.to_string();

        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM conversations WHERE user_id = ?1 ORDER BY updated_at DESC, id DESC",
                RawConversation::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id], RawConversation::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawConversation::into_record).collect()
        })
        .await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<StoredMessage>, PersistenceError> {
        let Some(id) = parse_thread_id(thread_id) else {
            return Ok(Vec::new());
        };

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, role, content, created_at FROM messages
                 WHERE conversation_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map(params![id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(message_id, role, content, created_at)| {
                    Ok(StoredMessage {
                        id: message_id,
                        thread_id: id.to_string(),
                        role: role.parse().map_err(PersistenceError::Corrupt)?,
                        content,
                        created_at: parse_time(&created_at)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn rename_conversation(
        &self,
        user_id: &str,
        language: &str,
        title: &str,
    ) -> Result<bool, PersistenceError> {
        let (user_id, language, title) =
            (user_id.to_string(), language.to_string(), title.to_string());

        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE conversations SET title = ?1, updated_at = ?2
                 WHERE user_id = ?3 AND language = ?4",
                params![title, now(), user_id, language],
            )?;
            Ok(updated > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_find_or_create_is_stable() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let a = repo.find_or_create_thread("u1", "French").await.unwrap();
        let b = repo.find_or_create_thread("u1", "French").await.unwrap();
        assert_eq!(a, b);

        let record = repo.get_conversation("u1", "French").await.unwrap().unwrap();
        assert_eq!(record.thread_id, a);
        assert_eq!(record.title, "French Conversation");
    }

    #[tokio::test]
    async fn test_one_conversation_per_language() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let first = repo.create_thread("u1", "French", "One").await.unwrap();
        let second = repo.create_thread("u1", "French", "Two").await.unwrap();

        assert_ne!(first, second);
        let listed = repo.list_conversations("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Two");
    }

    #[tokio::test]
    async fn test_delete_cascades_and_ids_are_not_recycled() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let old = repo.find_or_create_thread("u1", "German").await.unwrap();
        repo.append_message(&old, Role::User, "Hallo").await.unwrap();

        assert_eq!(repo.delete_thread("u1", "German").await.unwrap(), Some(old.clone()));
        assert_eq!(repo.delete_thread("u1", "German").await.unwrap(), None);
        assert!(repo.list_messages(&old).await.unwrap().is_empty());

        let new = repo.find_or_create_thread("u1", "German").await.unwrap();
        assert_ne!(old, new);
        assert!(repo.list_messages(&new).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_messages_in_order() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let thread = repo.find_or_create_thread("u1", "Spanish").await.unwrap();
        repo.append_messages(
            &thread,
            &[
                (Role::User, "Hola".to_string()),
                (Role::Assistant, "¡Hola! ¿Cómo estás?".to_string()),
            ],
        )
        .await
        .unwrap();

        let messages = repo.list_messages(&thread).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].thread_id, thread);
    }

    #[tokio::test]
    async fn test_append_to_missing_thread() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        for bogus in ["999", "not-a-number", "0"] {
            let err = repo.append_message(bogus, Role::User, "x").await.unwrap_err();
            assert!(matches!(err, PersistenceError::ThreadNotFound(_)), "{bogus}");
        }
    }

    #[tokio::test]
    async fn test_rename() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        repo.find_or_create_thread("u1", "Italian").await.unwrap();

        assert!(repo.rename_conversation("u1", "Italian", "Cucina").await.unwrap());
        assert!(!repo.rename_conversation("u1", "Dutch", "x").await.unwrap());
        let record = repo.get_conversation("u1", "Italian").await.unwrap().unwrap();
        assert_eq!(record.title, "Cucina");
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lingualand.db");

        let thread = {
            let repo = SqliteRepository::open(&path).unwrap();
            let thread = repo.find_or_create_thread("u1", "Japanese").await.unwrap();
            repo.append_message(&thread, Role::User, "こんにちは").await.unwrap();
            thread
        };

        let reopened = SqliteRepository::open(&path).unwrap();
        assert_eq!(reopened.find_or_create_thread("u1", "Japanese").await.unwrap(), thread);
        assert_eq!(reopened.list_messages(&thread).await.unwrap()[0].content, "こんにちは");
    }
}

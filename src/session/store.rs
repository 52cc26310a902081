//! Conversation Session Store
//!
//! Information Hiding:
//! - Per-thread locking hidden behind `checkout` and `ThreadLease`
//! - Checkpoint restore/save happens inside the store, callers only see turns
//! - Thread ids are opaque; the store knows nothing about users or languages
//!
//! Each thread id owns its own mutex, so writers on one thread are
//! serialized while different threads proceed in parallel. The in-memory
//! copy is authoritative for the lifetime of the process; a failed
//! checkpoint is reported but never rolls back a turn.

use super::Turn;
use crate::error::CheckpointError;
use crate::storage::Checkpointer;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

#[derive(Debug, Default)]
struct ThreadState {
    turns: Vec<Turn>,
    /// checkpoint restore already attempted
    restored: bool,
    /// durable history merged in, or superseded by live turns
    rehydrated: bool,
    /// slot was retired by `drop_thread`; holders must fetch a fresh one
    dropped: bool,
}

type Slot = Arc<Mutex<ThreadState>>;

pub struct ConversationSessionStore {
    threads: RwLock<HashMap<String, Slot>>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl ConversationSessionStore {
    /// Store without checkpoints; history lives only in memory.
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            checkpointer: None,
        }
    }

    pub fn with_checkpointer(checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            checkpointer: Some(checkpointer),
        }
    }

    async fn slot(&self, thread_id: &str) -> Slot {
        if let Some(slot) = self.threads.read().await.get(thread_id) {
            return Arc::clone(slot);
        }
        let mut threads = self.threads.write().await;
        Arc::clone(threads.entry(thread_id.to_string()).or_default())
    }

    /// Take exclusive hold of a thread until the lease is dropped.
    ///
    /// The conversation flow keeps the lease across generation and
    /// persistence so two exchanges on one thread never interleave.
    pub async fn checkout(&self, thread_id: &str) -> ThreadLease {
        loop {
            let slot = self.slot(thread_id).await;
            let mut state = slot.lock_owned().await;
            if state.dropped {
                continue;
            }

            if !state.restored {
                self.restore(thread_id, &mut state).await;
            }

            return ThreadLease {
                thread_id: thread_id.to_string(),
                state,
                checkpointer: self.checkpointer.clone(),
            };
        }
    }

    async fn restore(&self, thread_id: &str, state: &mut ThreadState) {
        let Some(checkpointer) = &self.checkpointer else {
            state.restored = true;
            return;
        };

        let loaded = checkpointer.load(thread_id).await;
        state.restored = true;

        match loaded {
            Ok(turns) if !turns.is_empty() => {
                tracing::debug!(
                    "[SessionStore] Restored {} turns for thread '{}' from checkpoint",
                    turns.len(),
                    thread_id
                );
                state.turns = turns;
                state.rehydrated = true;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    "[SessionStore] Checkpoint restore failed for thread '{}': {}",
                    thread_id,
                    e
                );
            }
        }
    }

    /// Current history of a thread; empty for a thread never seen.
    ///
    /// Only the checkpointer is consulted. `ConversationService::session_history`
    /// also loads turns from the conversation repository.
    pub async fn get_history(&self, thread_id: &str) -> Vec<Turn> {
        let known = self.threads.read().await.contains_key(thread_id);
        if known {
            return self.checkout(thread_id).await.history().to_vec();
        }

        match &self.checkpointer {
            Some(checkpointer) => checkpointer.load(thread_id).await.unwrap_or_else(|e| {
                tracing::warn!(
                    "[SessionStore] Checkpoint read failed for thread '{}': {}",
                    thread_id,
                    e
                );
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    /// Append one turn. An `Err` means only the checkpoint failed; the turn
    /// is already part of the in-memory history.
    pub async fn append_turn(&self, thread_id: &str, turn: Turn) -> Result<(), CheckpointError> {
        let mut lease = self.checkout(thread_id).await;
        lease.append(turn).await
    }

    /// Discard a thread's history. Waits for any lease holder to finish.
    pub async fn drop_thread(&self, thread_id: &str) -> Result<(), CheckpointError> {
        let slot = self.slot(thread_id).await;
        let mut state = slot.lock().await;

        state.turns.clear();
        state.restored = true;
        state.rehydrated = true;

        if let Some(checkpointer) = &self.checkpointer {
            // Keep the cleared slot registered so a stale snapshot is never
            // restored over it.
            checkpointer.delete(thread_id).await?;
        }

        state.dropped = true;
        let mut threads = self.threads.write().await;
        if threads
            .get(thread_id)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
        {
            threads.remove(thread_id);
        }

        tracing::info!("[SessionStore] Dropped thread '{}'", thread_id);
        Ok(())
    }

    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

impl Default for ConversationSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to one thread's history
pub struct ThreadLease {
    thread_id: String,
    state: OwnedMutexGuard<ThreadState>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl ThreadLease {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn history(&self) -> &[Turn] {
        &self.state.turns
    }

    pub fn len(&self) -> usize {
        self.state.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.turns.is_empty()
    }

    /// True while the thread has neither live turns nor restored history.
    pub fn needs_rehydration(&self) -> bool {
        !self.state.rehydrated && self.state.turns.is_empty()
    }

    /// Seed an empty thread with history loaded from durable storage.
    pub fn rehydrate(&mut self, turns: Vec<Turn>) {
        if self.state.turns.is_empty() && !turns.is_empty() {
            tracing::debug!(
                "[SessionStore] Rehydrated {} turns for thread '{}'",
                turns.len(),
                self.thread_id
            );
            self.state.turns = turns;
        }
        self.state.rehydrated = true;
    }

    pub async fn append(&mut self, turn: Turn) -> Result<(), CheckpointError> {
        self.push(turn);
        self.checkpoint().await
    }

    /// Append a user turn and its reply as one unit.
    ///
    /// Both turns are in memory before the first suspension point, so a
    /// cancelled caller can never leave only one of them behind.
    pub async fn commit_exchange(
        &mut self,
        user: Turn,
        assistant: Turn,
    ) -> Result<(), CheckpointError> {
        self.push(user);
        self.push(assistant);
        self.checkpoint().await
    }

    fn push(&mut self, mut turn: Turn) {
        // keep created_at monotonic within the thread even if the clock steps back
        if let Some(last) = self.state.turns.last() {
            if turn.created_at < last.created_at {
                turn.created_at = last.created_at;
            }
        }
        self.state.turns.push(turn);
        self.state.rehydrated = true;
    }

    async fn checkpoint(&self) -> Result<(), CheckpointError> {
        let Some(checkpointer) = &self.checkpointer else {
            return Ok(());
        };

        checkpointer
            .save(&self.thread_id, &self.state.turns)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    "[SessionStore] Checkpoint save failed for thread '{}': {}",
                    self.thread_id,
                    e
                );
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use crate::storage::InMemoryCheckpointer;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unknown_thread_has_empty_history() {
        let store = ConversationSessionStore::new();
        assert!(store.get_history("never-seen").await.is_empty());
        assert_eq!(store.thread_count().await, 0);
    }

    #[tokio::test]
    async fn test_append_then_get_preserves_order() {
        let store = ConversationSessionStore::new();
        store.append_turn("t", Turn::user("one")).await.unwrap();
        store.append_turn("t", Turn::assistant("two")).await.unwrap();
        store.append_turn("t", Turn::assistant("three")).await.unwrap();

        let history = store.get_history("t").await;
        let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(history[2].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_drop_thread_empties_history() {
        let store = ConversationSessionStore::new();
        store.append_turn("t", Turn::user("hi")).await.unwrap();

        store.drop_thread("t").await.unwrap();

        assert!(store.get_history("t").await.is_empty());
        store.append_turn("t", Turn::user("fresh")).await.unwrap();
        assert_eq!(store.get_history("t").await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(ConversationSessionStore::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append_turn("shared", Turn::user(format!("m{}", i))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let history = store.get_history("shared").await;
        assert_eq!(history.len(), 50);
        let mut contents: Vec<String> = history.into_iter().map(|t| t.content).collect();
        contents.sort();
        contents.dedup();
        assert_eq!(contents.len(), 50);
    }

    #[tokio::test]
    async fn test_created_at_is_monotonic() {
        let store = ConversationSessionStore::new();
        let mut late = Turn::user("first");
        late.created_at += ChronoDuration::seconds(60);
        store.append_turn("t", late).await.unwrap();
        store.append_turn("t", Turn::assistant("second")).await.unwrap();

        let history = store.get_history("t").await;
        assert!(history[1].created_at >= history[0].created_at);
    }

    #[tokio::test]
    async fn test_leases_on_one_thread_do_not_interleave() {
        let store = Arc::new(ConversationSessionStore::new());

        let first = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut lease = store.checkout("fr").await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                lease
                    .commit_exchange(Turn::user("Turn1"), Turn::assistant("Turn2"))
                    .await
                    .unwrap();
            })
        };
        let second = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut lease = store.checkout("fr").await;
                lease
                    .commit_exchange(Turn::user("Turn3"), Turn::assistant("Turn4"))
                    .await
                    .unwrap();
            })
        };
        first.await.unwrap();
        second.await.unwrap();

        let contents: Vec<String> = store
            .get_history("fr")
            .await
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert!(
            contents == ["Turn1", "Turn2", "Turn3", "Turn4"]
                || contents == ["Turn3", "Turn4", "Turn1", "Turn2"],
            "interleaved: {:?}",
            contents
        );
    }

    #[tokio::test]
    async fn test_distinct_threads_do_not_block() {
        let store = ConversationSessionStore::new();
        let _held = store.checkout("a").await;

        let other = tokio::time::timeout(Duration::from_millis(200), store.checkout("b")).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_history_restored_from_checkpoint() {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());

        let before_restart = ConversationSessionStore::with_checkpointer(Arc::clone(&checkpointer));
        before_restart.append_turn("t", Turn::user("Hola")).await.unwrap();
        before_restart.append_turn("t", Turn::assistant("¡Hola!")).await.unwrap();

        let after_restart = ConversationSessionStore::with_checkpointer(checkpointer);
        assert_eq!(after_restart.get_history("t").await.len(), 2);

        let lease = after_restart.checkout("t").await;
        assert_eq!(lease.len(), 2);
        assert!(!lease.needs_rehydration());
    }

    #[tokio::test]
    async fn test_drop_thread_removes_checkpoint() {
        let checkpointer: Arc<dyn Checkpointer> = Arc::new(InMemoryCheckpointer::new());
        let store = ConversationSessionStore::with_checkpointer(Arc::clone(&checkpointer));
        store.append_turn("t", Turn::user("x")).await.unwrap();

        store.drop_thread("t").await.unwrap();

        assert!(!checkpointer.exists("t").await.unwrap());
        let fresh = ConversationSessionStore::with_checkpointer(checkpointer);
        assert!(fresh.get_history("t").await.is_empty());
    }

    struct BrokenCheckpointer;

    #[async_trait]
    impl Checkpointer for BrokenCheckpointer {
        async fn save(&self, _: &str, _: &[Turn]) -> Result<(), CheckpointError> {
            Err(std::io::Error::other("disk full").into())
        }
        async fn load(&self, _: &str) -> Result<Vec<Turn>, CheckpointError> {
            Err(std::io::Error::other("disk gone").into())
        }
        async fn delete(&self, _: &str) -> Result<(), CheckpointError> {
            Err(std::io::Error::other("disk gone").into())
        }
        async fn list_threads(&self) -> Result<Vec<String>, CheckpointError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_checkpoint_failure_keeps_memory_state() {
        let store = ConversationSessionStore::with_checkpointer(Arc::new(BrokenCheckpointer));

        let result = store.append_turn("t", Turn::user("kept")).await;
        assert!(result.is_err());

        let history = store.get_history("t").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "kept");

        assert!(store.drop_thread("t").await.is_err());
        assert!(store.get_history("t").await.is_empty());
    }

    #[tokio::test]
    async fn test_rehydrate_only_fills_empty_threads() {
        let store = ConversationSessionStore::new();
        let mut lease = store.checkout("t").await;
        assert!(lease.needs_rehydration());

        lease.rehydrate(vec![Turn::user("old"), Turn::assistant("older reply")]);
        assert_eq!(lease.len(), 2);
        assert!(!lease.needs_rehydration());

        lease.rehydrate(vec![Turn::user("ignored")]);
        assert_eq!(lease.history()[0].content, "old");
    }
}

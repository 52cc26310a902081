//! In-Memory Checkpoints
//!
//! Snapshots live in a HashMap behind a RwLock and vanish with the process.
//! Useful for tests and for runs without a checkpoint directory.

use super::Checkpointer;
use crate::error::CheckpointError;
use crate::session::Turn;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct InMemoryCheckpointer {
    snapshots: RwLock<HashMap<String, Vec<Turn>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCheckpointer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, thread_id: &str, history: &[Turn]) -> Result<(), CheckpointError> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(thread_id.to_string(), history.to_vec());
        tracing::debug!(
            "[InMemoryCheckpointer] Saved {} turns for thread '{}'",
            history.len(),
            thread_id
        );
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Vec<Turn>, CheckpointError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(thread_id).cloned().unwrap_or_default())
    }

    async fn delete(&self, thread_id: &str) -> Result<(), CheckpointError> {
        self.snapshots.write().await.remove(thread_id);
        tracing::debug!("[InMemoryCheckpointer] Deleted thread '{}'", thread_id);
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>, CheckpointError> {
        Ok(self.snapshots.read().await.keys().cloned().collect())
    }

    async fn exists(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        Ok(self.snapshots.read().await.contains_key(thread_id))
    }
}

//! Session Checkpoint Storage
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind trait
//! - Allows swapping between memory and filesystem snapshots without touching the session store
//! - Each implementation owns its own layout and serialization

use crate::error::CheckpointError;
use crate::session::Turn;
use async_trait::async_trait;

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemCheckpointer;
pub use memory::InMemoryCheckpointer;

/// Snapshot storage for thread histories
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Replace the stored snapshot for a thread
    async fn save(&self, thread_id: &str, history: &[Turn]) -> Result<(), CheckpointError>;

    /// Load the snapshot for a thread
    /// Returns empty vector if none was saved
    async fn load(&self, thread_id: &str) -> Result<Vec<Turn>, CheckpointError>;

    async fn delete(&self, thread_id: &str) -> Result<(), CheckpointError>;

    async fn list_threads(&self) -> Result<Vec<String>, CheckpointError>;

    async fn exists(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        Ok(!self.load(thread_id).await?.is_empty())
    }
}

//! File System Checkpoints
//!
//! Information Hiding:
//! - File paths and JSON layout hidden from the session store
//! - Writes go through a temp file and a rename so a crash never leaves half a snapshot
//! - Directory management handled on construction

use super::Checkpointer;
use crate::error::CheckpointError;
use crate::session::Turn;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One JSON file per thread: `{base_path}/{thread_id}.json`
pub struct FileSystemCheckpointer {
    base_path: PathBuf,
}

impl FileSystemCheckpointer {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn thread_path(&self, thread_id: &str) -> Result<PathBuf, CheckpointError> {
        let usable = !thread_id.is_empty()
            && thread_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !usable {
            return Err(CheckpointError::InvalidThreadId(thread_id.to_string()));
        }
        Ok(self.base_path.join(format!("{}.json", thread_id)))
    }
}

#[async_trait]
impl Checkpointer for FileSystemCheckpointer {
    async fn save(&self, thread_id: &str, history: &[Turn]) -> Result<(), CheckpointError> {
        let path = self.thread_path(thread_id)?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(history)?;

        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(
            "[FileSystemCheckpointer] Saved {} turns for thread '{}' to {:?}",
            history.len(),
            thread_id,
            path
        );
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Vec<Turn>, CheckpointError> {
        let path = self.thread_path(thread_id)?;

        if !fs::try_exists(&path).await? {
            tracing::debug!("[FileSystemCheckpointer] No checkpoint for thread '{}'", thread_id);
            return Ok(Vec::new());
        }

        let json = fs::read(&path).await?;
        let history: Vec<Turn> = serde_json::from_slice(&json)?;

        tracing::debug!(
            "[FileSystemCheckpointer] Loaded {} turns for thread '{}'",
            history.len(),
            thread_id
        );
        Ok(history)
    }

    async fn delete(&self, thread_id: &str) -> Result<(), CheckpointError> {
        let path = self.thread_path(thread_id)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("[FileSystemCheckpointer] Deleted thread '{}'", thread_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_threads(&self) -> Result<Vec<String>, CheckpointError> {
        let mut threads = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(thread_id) = path.file_stem().and_then(|s| s.to_str()) {
                    threads.push(thread_id.to_string());
                }
            }
        }

        Ok(threads)
    }

    async fn exists(&self, thread_id: &str) -> Result<bool, CheckpointError> {
        let path = self.thread_path(thread_id)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let checkpointer = FileSystemCheckpointer::new(temp_dir.path()).await.unwrap();
        let turns = vec![Turn::user("Ciao"), Turn::assistant("Ciao! Come stai?")];

        checkpointer.save("42", &turns).await.unwrap();
        let loaded = checkpointer.load("42").await.unwrap();

        assert_eq!(loaded, turns);
        assert!(checkpointer.exists("42").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let checkpointer = FileSystemCheckpointer::new(temp_dir.path()).await.unwrap();

        checkpointer.save("7", &[Turn::user("one")]).await.unwrap();
        checkpointer
            .save("7", &[Turn::user("one"), Turn::assistant("two")])
            .await
            .unwrap();

        assert_eq!(checkpointer.load("7").await.unwrap().len(), 2);
        assert_eq!(checkpointer.list_threads().await.unwrap(), vec!["7".to_string()]);
    }

    #[tokio::test]
    async fn test_load_nonexistent_thread() {
        let temp_dir = TempDir::new().unwrap();
        let checkpointer = FileSystemCheckpointer::new(temp_dir.path()).await.unwrap();
        assert!(checkpointer.load("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let checkpointer = FileSystemCheckpointer::new(temp_dir.path()).await.unwrap();

        checkpointer.save("9", &[Turn::user("x")]).await.unwrap();
        checkpointer.delete("9").await.unwrap();
        checkpointer.delete("9").await.unwrap();

        assert!(!checkpointer.exists("9").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_path_like_thread_ids() {
        let temp_dir = TempDir::new().unwrap();
        let checkpointer = FileSystemCheckpointer::new(temp_dir.path()).await.unwrap();

        let err = checkpointer.save("../escape", &[]).await.unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidThreadId(_)));
    }
}

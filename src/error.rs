//! Error Taxonomy
//!
//! Each failure class a caller has to tell apart gets its own type:
//! - `PromptError`: a template could not be resolved
//! - `GenerationError`: the provider call failed, nothing was recorded
//! - `PersistenceError` / `CheckpointError`: durability problems
//! - `ServiceError`: what the service layer surfaces to its callers

use crate::prompts::PromptKind;
use crate::service::{ConverseReply, PendingExchange};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("missing parameter '{name}' for {kind} prompt")]
    MissingParameter { kind: PromptKind, name: String },

    #[error("unknown prompt kind '{0}'")]
    UnknownKind(String),

    #[error("{0} prompts need a conversation thread")]
    RequiresHistory(PromptKind),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("unusable provider response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    /// Whether a caller-side retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("thread id '{0}' cannot be used as a checkpoint key")]
    InvalidThreadId(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("conversation thread '{0}' not found")]
    ThreadNotFound(String),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    #[error("database connection lock poisoned")]
    LockPoisoned,

    #[error("blocking database task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Template resolution failed, most often a missing parameter
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// The reply exists and is already part of the live session, only the
    /// durable write is outstanding. Hand `pending` to
    /// `ConversationService::retry_persist` to finish it.
    #[error("reply produced but not saved: {source}")]
    Persistence {
        reply: Box<ConverseReply>,
        pending: Box<PendingExchange>,
        #[source]
        source: PersistenceError,
    },

    #[error("conversation thread '{0}' not found")]
    ThreadNotFound(String),

    #[error("conversation store unavailable: {0}")]
    Storage(#[source] PersistenceError),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation(_))
    }

    /// The reply that was produced despite a durability failure.
    pub fn reply(&self) -> Option<&ConverseReply> {
        match self {
            Self::Persistence { reply, .. } => Some(reply),
            _ => None,
        }
    }
}

impl From<PersistenceError> for ServiceError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::ThreadNotFound(id) => Self::ThreadNotFound(id),
            other => Self::Storage(other),
        }
    }
}

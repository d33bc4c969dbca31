// crates/sync-engine/src/error.rs
//! Error types for sync operations

use thiserror::Error;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// The actor task is gone
    #[error("Sync actor is not running")]
    ActorStopped,

    /// Sync is switched off
    #[error("Sync is disabled")]
    Disabled,

    /// The access gate refused
    #[error("Not authorized to sync")]
    NotAuthorized,

    /// A record failed validation
    #[error(transparent)]
    InvalidRecord(#[from] timershare_core::CoreError),

    /// Every conflict retry was used up
    #[error("[{op_id}] conflict persisted after {attempts} attempts")]
    ConflictExhausted { op_id: String, attempts: usize },

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for SyncError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        SyncError::ActorStopped
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for SyncError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        SyncError::ActorStopped
    }
}

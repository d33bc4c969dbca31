// crates/network/src/store.rs
//! Conditional read/write access to the shared document

use crate::error::NetworkError;
use async_trait::async_trait;
use timershare_core::{ETag, SyncDocument};

/// Result of a conditional read
#[derive(Debug)]
pub enum PullOutcome {
    /// The known version is still current
    Unchanged,
    /// A newer version was returned
    Updated {
        document: SyncDocument,
        etag: Option<ETag>,
    },
    /// Transport, status, parse or breaker failure
    Failed(NetworkError),
}

impl PullOutcome {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            PullOutcome::Unchanged => "unchanged",
            PullOutcome::Updated { .. } => "updated",
            PullOutcome::Failed(_) => "failed",
        }
    }
}

/// Result of a conditional write
#[derive(Debug)]
pub enum PushOutcome {
    /// The write was stored; carries the new version if the remote sent one
    Accepted { etag: Option<ETag> },
    /// The expected version was no longer current
    Conflict,
    /// Transport, status or breaker failure
    Failed(NetworkError),
}

impl PushOutcome {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            PushOutcome::Accepted { .. } => "accepted",
            PushOutcome::Conflict => "conflict",
            PushOutcome::Failed(_) => "failed",
        }
    }
}

/// A remote holding the single shared document
///
/// Implementations never return errors directly: every failure is folded
/// into the outcome so callers can keep their stale copy and carry on.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads the document unless `known` is still the current version
    async fn pull(&self, known: Option<&ETag>) -> PullOutcome;

    /// Writes `document` if `expected` is still the current version
    async fn push(&self, document: &SyncDocument, expected: Option<&ETag>) -> PushOutcome;

    /// Compact one-line state for debug output
    fn debug_metrics(&self) -> String {
        String::new()
    }
}

// crates/sync-engine/src/types.rs
//! Sync engine types: operation ids, write states, outcomes and metrics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Short operation id used to correlate log lines
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpId(String);

impl OpId {
    /// Creates a fresh 6-character id
    pub fn new() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple[..6].to_string())
    }

    /// Returns the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OpId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// States of a write attempt
///
/// Happy path: `Pending -> Revalidating -> Merged -> Pushed`. Contention
/// loops through `ConflictDetected -> Revalidating` until the retry bound
/// is reached. Nothing is rolled back; a failed write leaves the last
/// committed state in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WriteState {
    Pending,
    Revalidating,
    Merged,
    ConflictDetected,
    Pushed,
    Failed,
}

impl WriteState {
    /// Returns true for `Pushed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, WriteState::Pushed | WriteState::Failed)
    }
}

/// Trace of a finished write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub op_id: OpId,
    /// Every state visited, in order, ending with a terminal state
    pub transitions: Vec<WriteState>,
    /// POST requests issued
    pub push_attempts: usize,
}

impl WriteReport {
    pub(crate) fn new(op_id: OpId) -> Self {
        Self {
            op_id,
            transitions: vec![WriteState::Pending],
            push_attempts: 0,
        }
    }

    pub(crate) fn enter(&mut self, state: WriteState) {
        self.transitions.push(state);
    }

    /// Final state of the write
    pub fn final_state(&self) -> WriteState {
        self.transitions.last().copied().unwrap_or(WriteState::Pending)
    }

    /// Returns true if the write was stored remotely
    pub fn is_pushed(&self) -> bool {
        self.final_state() == WriteState::Pushed
    }

    /// Number of conflicts met on the way
    pub fn conflicts(&self) -> usize {
        self.transitions
            .iter()
            .filter(|s| **s == WriteState::ConflictDetected)
            .count()
    }
}

/// Result of a revalidate-and-merge pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RevalidateOutcome {
    /// Newer remote content was merged in
    Merged,
    /// The remote still holds the known version
    Unchanged,
    /// The pull failed; the stale copy is kept
    Failed,
}

/// Result of `SyncCoordinator::upsert`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Applied locally, push scheduled after the debounce delay
    Scheduled,
    /// Same event seen within the dedup window
    Duplicate,
    /// The committed record already matches
    AlreadySynced,
    /// Sync is disabled
    Disabled,
    /// The access gate refused
    NotAuthorized,
    /// The record failed validation
    Rejected(String),
}

impl UpsertOutcome {
    /// Returns true if a push was scheduled
    pub fn is_scheduled(&self) -> bool {
        matches!(self, UpsertOutcome::Scheduled)
    }
}

/// Counters describing sync activity
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncMetrics {
    /// Corrected instant of the last successful pull (200 or 304)
    pub last_pull: Option<DateTime<Utc>>,
    /// Pulls that returned new content
    pub pulls_updated: u64,
    /// Pulls answered with "not modified"
    pub pulls_unchanged: u64,
    /// Accepted pushes
    pub pushes: u64,
    /// Conflicts reported by the remote
    pub conflicts: u64,
    /// Failed pulls and pushes, conflicts exhausted included
    pub failures: u64,
    /// Records dropped by prune passes
    pub pruned: u64,
    /// Upserts dropped by the dedup window
    pub duplicates: u64,
    /// Whether an operation is waiting on the network
    pub in_progress: bool,
}

impl SyncMetrics {
    /// Compact one-line form
    pub fn compact(&self) -> String {
        let last_pull = self
            .last_pull
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "pull={}(+{}/={}) push={} conflict={} fail={} pruned={} dup={}",
            last_pull,
            self.pulls_updated,
            self.pulls_unchanged,
            self.pushes,
            self.conflicts,
            self.failures,
            self.pruned,
            self.duplicates
        )
    }
}

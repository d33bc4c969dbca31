//! Sync timing configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};

/// Timing, dedup, conflict and breaker settings of the sync engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncSection {
    /// Start with sync switched on
    pub enabled: bool,

    /// Quiet period before a local change is pushed
    pub debounce_secs: u64,

    pub pull_interval_secs: u64,

    pub prune_interval_secs: u64,

    /// How long a seen event suppresses its duplicates
    pub dedup_window_secs: u64,

    /// Expiry rounding used to spot duplicates
    pub dedup_granularity_secs: u64,

    /// Expiry gap under which an upsert counts as already synced
    pub equivalence_tolerance_secs: u64,

    /// Revalidate-and-retry rounds after a version conflict
    pub conflict_retries: usize,

    /// Consecutive failures before a breaker opens
    pub breaker_failure_threshold: usize,

    /// How long an open breaker rejects calls
    pub breaker_open_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_secs: 12,
            pull_interval_secs: 15,
            prune_interval_secs: 30,
            dedup_window_secs: 30,
            dedup_granularity_secs: 10,
            equivalence_tolerance_secs: 10,
            conflict_retries: 1,
            breaker_failure_threshold: 3,
            breaker_open_secs: 120,
        }
    }
}

impl ConfigSection for SyncSection {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        Validator::collect_errors(vec![
            Validator::in_range(self.debounce_secs, 1, 300, "sync.debounce_secs"),
            Validator::in_range(self.pull_interval_secs, 5, 3600, "sync.pull_interval_secs"),
            Validator::in_range(self.prune_interval_secs, 5, 3600, "sync.prune_interval_secs"),
            Validator::in_range(self.dedup_window_secs, 1, 600, "sync.dedup_window_secs"),
            Validator::in_range(
                self.dedup_granularity_secs,
                1,
                60,
                "sync.dedup_granularity_secs",
            ),
            Validator::in_range(
                self.equivalence_tolerance_secs,
                0,
                60,
                "sync.equivalence_tolerance_secs",
            ),
            Validator::in_range(self.conflict_retries, 0, 5, "sync.conflict_retries"),
            Validator::in_range(
                self.breaker_failure_threshold,
                1,
                20,
                "sync.breaker_failure_threshold",
            ),
            Validator::in_range(self.breaker_open_secs, 1, 3600, "sync.breaker_open_secs"),
        ])
    }

    fn merge(&mut self, other: Self) {
        *self = other;
    }

    fn section_name(&self) -> &'static str {
        "sync"
    }
}

//! Deterministic merge of a pulled remote document into the local one
//!
//! Rules, applied per key after both sides are stripped of expired records:
//! - a key present on one side only keeps that side's record
//! - a key present on both sides keeps the later `expires_at`
//! - equal `expires_at` keeps the local record
//!
//! Shared metadata (version, ttl, settings, stats) comes from the remote side,
//! except the creation counter which never goes backward.

use crate::types::SyncDocument;
use chrono::{DateTime, Utc};

/// Merges `remote` into `local` at the corrected instant `now`
pub fn merge_documents(
    local: &SyncDocument,
    remote: &SyncDocument,
    now: DateTime<Utc>,
) -> SyncDocument {
    let mut timers = local.timers.clone();
    timers.retain(|_, record| !record.is_expired(now));

    for (key, theirs) in remote.timers.iter() {
        if theirs.is_expired(now) {
            continue;
        }
        let replace = match timers.get(key) {
            Some(ours) => theirs.expires_at > ours.expires_at,
            None => true,
        };
        if replace {
            let mut adopted = theirs.clone();
            adopted.key = key.clone();
            timers.insert(key.clone(), adopted);
        }
    }

    let mut merged = SyncDocument {
        version: remote.version.clone(),
        last_updated: local.last_updated.max(remote.last_updated),
        ttl_minutes: remote.ttl_minutes,
        settings: remote.settings.clone(),
        timers,
        stats: remote.stats.clone(),
    };
    merged.stats.total_timers_created = local
        .stats
        .total_timers_created
        .max(remote.stats.total_timers_created);
    merged.touch(now);
    merged
}

impl SyncDocument {
    /// Merges a remote document into this one, see [`merge_documents`]
    pub fn merged_with(&self, remote: &SyncDocument, now: DateTime<Utc>) -> SyncDocument {
        merge_documents(self, remote, now)
    }
}

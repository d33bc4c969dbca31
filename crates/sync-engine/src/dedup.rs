// crates/sync-engine/src/dedup.rs
//! Suppression of re-derived duplicate timer events

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Seen-set of `(key, expiresAt bucket)` pairs with a fixed lifetime
///
/// The same countdown parsed twice from the host yields expiry instants a
/// few seconds apart; bucketing them lets the second sighting collapse into
/// the first.
#[derive(Debug)]
pub struct DedupWindow {
    ttl: Duration,
    granularity_secs: i64,
    seen: HashMap<(String, i64), Instant>,
}

impl DedupWindow {
    /// Creates a window remembering entries for `ttl`, bucketing expiry by `granularity`
    pub fn new(ttl: Duration, granularity: Duration) -> Self {
        Self {
            ttl,
            granularity_secs: granularity.as_secs().max(1) as i64,
            seen: HashMap::new(),
        }
    }

    /// Records the event and returns true if it was not seen within the window
    pub fn check_and_insert(&mut self, key: &str, expires_at: DateTime<Utc>) -> bool {
        let now = Instant::now();
        self.purge(now);

        let entry = (key.to_string(), self.bucket(expires_at));
        if self.seen.contains_key(&entry) {
            return false;
        }
        self.seen.insert(entry, now);
        true
    }

    /// Drops the entry recorded for this event, so it counts as fresh again
    pub fn release(&mut self, key: &str, expires_at: DateTime<Utc>) {
        let entry = (key.to_string(), self.bucket(expires_at));
        self.seen.remove(&entry);
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if the window holds no entries
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn bucket(&self, expires_at: DateTime<Utc>) -> i64 {
        let g = self.granularity_secs;
        (expires_at.timestamp() + g / 2).div_euclid(g)
    }

    fn purge(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.seen.retain(|_, seen_at| now.duration_since(*seen_at) < ttl);
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(10))
    }
}

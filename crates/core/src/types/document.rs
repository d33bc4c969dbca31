//! The shared document exchanged with the remote store

use crate::error::CoreResult;
use crate::types::TimerRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Schema tag written into every document
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Whole shared resource
///
/// Treated as an immutable value: every mutation produces a new document so
/// snapshots handed to readers never change underneath them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDocument {
    /// Document schema tag
    #[serde(default = "default_version")]
    pub version: String,
    /// UTC instant of the last mutation
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
    /// Suggested remote cache lifetime, informational only
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u32,
    /// Informational settings shared by all clients
    #[serde(default)]
    pub settings: DocumentSettings,
    /// Timers by key
    #[serde(default, deserialize_with = "deserialize_timers")]
    pub timers: BTreeMap<String, TimerRecord>,
    /// Informational counters
    #[serde(default)]
    pub stats: DocumentStats,
}

/// Informational settings carried in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentSettings {
    pub auto_cleanup_expired: bool,
    pub max_timers_per_dimension: u32,
    pub sync_enabled: bool,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            auto_cleanup_expired: true,
            max_timers_per_dimension: 1,
            sync_enabled: true,
        }
    }
}

/// Informational counters carried in the document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentStats {
    pub total_timers_created: u64,
    #[serde(rename = "activeUsers24h")]
    pub active_users_24h: u64,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

fn default_ttl_minutes() -> u32 {
    60
}

fn deserialize_timers<'de, D>(deserializer: D) -> Result<BTreeMap<String, TimerRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut timers = BTreeMap::<String, TimerRecord>::deserialize(deserializer)?;
    for (key, record) in timers.iter_mut() {
        record.key = key.clone();
    }
    Ok(timers)
}

impl SyncDocument {
    /// Creates an empty document
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: default_version(),
            last_updated: now,
            ttl_minutes: default_ttl_minutes(),
            settings: DocumentSettings::default(),
            timers: BTreeMap::new(),
            stats: DocumentStats::default(),
        }
    }

    /// Parses a document from its JSON wire form
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the document to its compact JSON wire form
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the document as indented JSON
    pub fn to_json_pretty(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the record for `key`, expired or not
    pub fn get(&self, key: &str) -> Option<&TimerRecord> {
        self.timers.get(key)
    }

    /// Number of records, expired ones included
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns true if the document holds no records
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Records still running at `now`
    pub fn active_timers(&self, now: DateTime<Utc>) -> impl Iterator<Item = &TimerRecord> {
        self.timers.values().filter(move |r| !r.is_expired(now))
    }

    /// Returns a copy with `record` inserted or replaced
    pub fn with_timer(&self, record: TimerRecord, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.timers.insert(record.key.clone(), record);
        next.stats.total_timers_created += 1;
        next.touch(now);
        next
    }

    /// Returns a copy without the records expired at `now`, and how many were dropped
    pub fn pruned(&self, now: DateTime<Utc>) -> (Self, usize) {
        let mut next = self.clone();
        next.timers.retain(|_, record| !record.is_expired(now));
        let removed = self.timers.len() - next.timers.len();
        if removed > 0 {
            next.touch(now);
        }
        (next, removed)
    }

    /// Advances `last_updated` without ever moving it backward
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
    }
}

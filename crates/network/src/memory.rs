// crates/network/src/memory.rs
//! In-process remote store with the same conditional semantics as the HTTP endpoint
//!
//! Used by the simulator and by tests that need several clients sharing one
//! document without a server. The document is held in its JSON wire form so
//! every read goes through the same parser as a real response.

use crate::error::NetworkError;
use crate::store::{PullOutcome, PushOutcome, RemoteStore};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use timershare_core::{ETag, SyncDocument};

#[derive(Debug, Default)]
struct MemoryState {
    body: String,
    version: u64,
    gets: u64,
    posts: u64,
    fail_pulls: usize,
    fail_pushes: usize,
    forced_conflicts: usize,
}

/// Request counters of a [`MemoryStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub gets: u64,
    pub posts: u64,
    pub version: u64,
}

/// Shared in-memory document with ETag preconditions
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    latency: Duration,
}

impl MemoryStore {
    /// Creates a store holding `document` as version 1
    pub fn new(document: &SyncDocument) -> Self {
        let body = document.to_json().unwrap_or_default();
        Self {
            state: Mutex::new(MemoryState {
                body,
                version: 1,
                ..MemoryState::default()
            }),
            latency: Duration::ZERO,
        }
    }

    /// Adds a simulated round-trip delay to every request
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Makes the next `count` pulls fail
    pub fn fail_next_pulls(&self, count: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_pulls = count;
        }
    }

    /// Makes the next `count` pushes fail
    pub fn fail_next_pushes(&self, count: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_pushes = count;
        }
    }

    /// Makes the next `count` pushes report a conflict regardless of ETag
    pub fn force_conflicts(&self, count: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.forced_conflicts = count;
        }
    }

    /// Current ETag
    pub fn etag(&self) -> Option<ETag> {
        self.state.lock().ok().map(|s| etag_for(s.version))
    }

    /// Parses and returns the stored document
    pub fn document(&self) -> Option<SyncDocument> {
        let body = self.state.lock().ok()?.body.clone();
        SyncDocument::from_json(&body).ok()
    }

    /// Request counters
    pub fn stats(&self) -> MemoryStats {
        self.state
            .lock()
            .map(|s| MemoryStats {
                gets: s.gets,
                posts: s.posts,
                version: s.version,
            })
            .unwrap_or_default()
    }

    async fn round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn etag_for(version: u64) -> ETag {
    ETag::new(format!("\"v{}\"", version))
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn pull(&self, known: Option<&ETag>) -> PullOutcome {
        self.round_trip().await;

        let (body, current) = {
            let Ok(mut state) = self.state.lock() else {
                return PullOutcome::Failed(NetworkError::Custom("Lock poisoned".to_string()));
            };
            state.gets += 1;
            if state.fail_pulls > 0 {
                state.fail_pulls -= 1;
                return PullOutcome::Failed(NetworkError::Status(503));
            }
            let current = etag_for(state.version);
            if known == Some(&current) {
                return PullOutcome::Unchanged;
            }
            (state.body.clone(), current)
        };

        match SyncDocument::from_json(&body) {
            Ok(document) => PullOutcome::Updated {
                document,
                etag: Some(current),
            },
            Err(e) => PullOutcome::Failed(e.into()),
        }
    }

    async fn push(&self, document: &SyncDocument, expected: Option<&ETag>) -> PushOutcome {
        self.round_trip().await;

        let body = match document.to_json() {
            Ok(body) => body,
            Err(e) => return PushOutcome::Failed(e.into()),
        };

        let Ok(mut state) = self.state.lock() else {
            return PushOutcome::Failed(NetworkError::Custom("Lock poisoned".to_string()));
        };
        state.posts += 1;
        if state.fail_pushes > 0 {
            state.fail_pushes -= 1;
            return PushOutcome::Failed(NetworkError::Status(503));
        }
        if state.forced_conflicts > 0 {
            state.forced_conflicts -= 1;
            return PushOutcome::Conflict;
        }
        if let Some(expected) = expected {
            if *expected != etag_for(state.version) {
                return PushOutcome::Conflict;
            }
        }

        state.body = body;
        state.version += 1;
        PushOutcome::Accepted {
            etag: Some(etag_for(state.version)),
        }
    }

    fn debug_metrics(&self) -> String {
        let stats = self.stats();
        format!("MEM[v={},get={},post={}]", stats.version, stats.gets, stats.posts)
    }
}

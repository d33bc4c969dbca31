// crates/sync-engine/src/lib.rs
//! Shared-timer synchronization engine
//!
//! This crate keeps a local copy of the shared timer document consistent with
//! the remote store:
//! - `SyncActor` serializes every read-modify-write of the `(document, etag)` pair
//! - `SyncCoordinator` debounces local upserts, drops duplicates and runs the
//!   periodic pull and prune loops
//! - conflicts are resolved by revalidating, merging and pushing again
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use timershare_core::{ClockSkewEstimator, SyncDocument};
//! use timershare_network::MemoryStore;
//! use timershare_sync_engine::{Collaborators, SyncConfig, SyncCoordinator};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let clock = Arc::new(ClockSkewEstimator::system());
//! let store = Arc::new(MemoryStore::new(&SyncDocument::new(clock.now())));
//!
//! let sync = SyncCoordinator::new(SyncConfig::default(), store, clock, Collaborators::default());
//! sync.start();
//!
//! let outcome = sync
//!     .start_timer("overworld", Duration::from_secs(90), "dusk", "Dusk")
//!     .await
//!     .unwrap();
//! assert!(outcome.is_scheduled());
//! assert!(sync.get("overworld").is_some());
//!
//! sync.shutdown();
//! # }
//! ```

mod actor;
mod collaborators;
mod coordinator;
mod dedup;
mod error;
mod types;

pub use actor::{Snapshot, SyncActor};
pub use collaborators::{AllowAll, DisplayNameProvider, StaticName, SyncGate};
pub use coordinator::{Collaborators, SyncConfig, SyncCoordinator};
pub use dedup::DedupWindow;
pub use error::{SyncError, SyncResult};
pub use types::{
    OpId, RevalidateOutcome, SyncMetrics, UpsertOutcome, WriteReport, WriteState,
};

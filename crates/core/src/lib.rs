//! Shared data model for TimerShare
//!
//! This crate holds everything the synchronization layers agree on:
//! - `TimerRecord` and `SyncDocument`, the values exchanged over the wire
//! - the deterministic document merge
//! - `ClockSkewEstimator`, the corrected notion of "now" every client uses
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use timershare_core::{ClockSkewEstimator, SyncDocument, TimerRecord};
//!
//! let clock = Arc::new(ClockSkewEstimator::system());
//! let now = clock.now();
//!
//! let record = TimerRecord::new("overworld", Duration::from_secs(90), "alice", now);
//! let doc = SyncDocument::new(now).with_timer(record, now);
//! assert_eq!(doc.len(), 1);
//! ```

pub mod clock;
pub mod error;
pub mod merge;
pub mod types;

pub use clock::{ClockSkewEstimator, ManualClock, SkewConfig, SystemClock, TimeSource};
pub use error::{CoreError, CoreResult};
pub use merge::merge_documents;
pub use types::{
    DocumentSettings, DocumentStats, ETag, SyncDocument, TimerRecord, Validator,
    DOCUMENT_VERSION,
};

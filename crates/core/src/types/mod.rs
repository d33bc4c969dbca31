//! Domain types for TimerShare
//!
//! - `record`: a single shared countdown
//! - `document`: the whole shared resource and its metadata
//! - `etag`: the opaque version token of the remote document
//! - `common`: shared traits

mod common;
mod document;
mod etag;
mod record;

pub use common::Validator;
pub use document::{DocumentSettings, DocumentStats, SyncDocument, DOCUMENT_VERSION};
pub use etag::ETag;
pub use record::TimerRecord;

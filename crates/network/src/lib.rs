// crates/network/src/lib.rs
//! Remote access to the shared timer document
//!
//! - `RemoteStore`: conditional pull/push contract used by the sync engine
//! - `HttpSyncClient`: reqwest implementation with read and write breakers
//! - `MemoryStore`: in-process implementation for simulation and tests

mod client;
mod error;
mod memory;
mod store;

pub use client::{ClientConfig, HttpSyncClient};
pub use error::{NetworkError, NetworkResult};
pub use memory::{MemoryStats, MemoryStore};
pub use store::{PullOutcome, PushOutcome, RemoteStore};

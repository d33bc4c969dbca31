// crates/resilience/src/lib.rs
//! Resilience patterns for the sync client
//!
//! This module provides:
//! - Circuit breaker, one instance per request direction
//! - Bounded retry policy with exponential backoff
//!
//! # Example
//!
//! ```rust
//! use timershare_resilience::{CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
//! use std::time::Duration;
//!
//! // Conflict handling: one retry after the first attempt
//! let policy = RetryPolicy::new(2).with_initial_delay(Duration::ZERO);
//! assert!(policy.allows_attempt(1));
//!
//! // Three consecutive failures open the breaker for two minutes
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::default()).with_name("write");
//! assert!(breaker.can_proceed().is_ok());
//! ```

mod circuit_breaker;
mod error;
mod retry;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{ResilienceError, ResilienceResult};
pub use retry::RetryPolicy;

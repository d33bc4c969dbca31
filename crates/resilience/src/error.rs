// crates/resilience/src/error.rs
//! Error types for resilience operations

use thiserror::Error;

/// Result type for resilience operations
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// Errors that can occur in resilience operations
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Circuit breaker is open
    #[error(
        "Circuit breaker '{name}' is open (failures: {failures}, retry in {retry_in:?})"
    )]
    CircuitBreakerOpen {
        name: String,
        failures: usize,
        retry_in: std::time::Duration,
    },

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

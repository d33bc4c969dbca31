// crates/network/src/error.rs
//! Error types for network operations

use thiserror::Error;

/// Result type for network operations
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Errors that can occur talking to the remote store
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// Connect or request timeout
    #[error("Operation timed out")]
    Timeout,

    /// Response status outside the protocol
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// Response body is not a valid document
    #[error("Malformed remote document: {0}")]
    MalformedDocument(#[from] timershare_core::CoreError),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request short-circuited by an open breaker
    #[error("Resilience error: {0}")]
    Resilience(#[from] timershare_resilience::ResilienceError),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            NetworkError::Timeout
        } else {
            NetworkError::Http(error)
        }
    }
}

impl NetworkError {
    /// Returns true if the error is worth retrying on the next cycle
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Timeout | NetworkError::Http(_) | NetworkError::Resilience(_) => true,
            NetworkError::Status(code) => *code >= 500 || *code == 429,
            _ => false,
        }
    }

    /// Returns true if no request was sent because a breaker is open
    pub fn is_short_circuit(&self) -> bool {
        matches!(self, NetworkError::Resilience(_))
    }
}

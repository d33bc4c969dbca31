//! Error types for the shared data model

use thiserror::Error;

/// Result type for data model operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while handling sync documents and timer records
#[derive(Debug, Error)]
pub enum CoreError {
    /// The remote document could not be parsed or serialized
    #[error("Malformed sync document: {0}")]
    MalformedDocument(#[from] serde_json::Error),

    /// A timer record violates its invariants
    #[error("Invalid timer record '{key}': {reasons}")]
    InvalidRecord { key: String, reasons: String },
}

impl CoreError {
    /// Builds an `InvalidRecord` error from a list of validation messages
    pub fn invalid_record(key: impl Into<String>, reasons: Vec<String>) -> Self {
        Self::InvalidRecord {
            key: key.into(),
            reasons: reasons.join("; "),
        }
    }

    /// Returns true if retrying with fresh remote data can clear the error
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::MalformedDocument(_))
    }
}

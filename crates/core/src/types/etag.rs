//! Entity tag of the shared document

use std::fmt;

/// Opaque version token returned by the remote store
///
/// Only ever compared for equality. The value is kept verbatim, quotes and
/// weak prefix included, so it can be echoed back in precondition headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag(String);

impl ETag {
    /// Wraps a raw header value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Builds an ETag from an optional header value, ignoring blank values
    pub fn from_header(value: Option<&str>) -> Option<Self> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    /// Returns the raw header value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Unified error type for data layer
//!
//! One error type for every span store backend, whatever it is backed by.
//! Backend-specific error values are flattened into strings at the boundary
//! so the domain layer never depends on backend crates.

use thiserror::Error;

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Record could not be encoded or decoded for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Conflict error (e.g., duplicate span identity)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Create a not-found error for a span identity
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a backend error with preserved context
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

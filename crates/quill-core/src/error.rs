//! Error types for quill-core

use thiserror::Error;

use crate::remote::{AuthError, PersistenceError};

/// Result type alias using quill-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quill-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed local input, rejected before any remote call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Authentication failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Note CRUD failure
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Note not found in the in-memory collection
    #[error("Note not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether the operation may be retried without changing its input.
    ///
    /// Validation and not-found errors are deterministic; auth and
    /// persistence failures are transient from the client's point of view.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Persistence(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_retryable() {
        let error = Error::Validation("code must be 6 digits".to_string());
        assert!(!error.is_retryable());
    }

    #[test]
    fn persistence_errors_are_retryable() {
        let error = Error::Persistence(PersistenceError::Api("HTTP 503".to_string()));
        assert!(error.is_retryable());
    }
}

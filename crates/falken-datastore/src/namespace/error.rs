//! Error types for namespace (byte-store) operations.

use thiserror::Error;

/// Result type for namespace operations.
pub type NamespaceResult<T> = Result<T, NamespaceError>;

/// Errors raised by the underlying byte-store.
#[derive(Debug, Error)]
pub enum NamespaceError {
    /// No file exists at the requested path.
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// Invalid namespace specification (URL parsing failed).
    #[error("invalid namespace spec '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// Glob pattern could not be compiled.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Network or I/O error.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Generic error from the underlying object store.
    #[error("object store error: {0}")]
    ObjectStore(object_store::Error),
}

impl NamespaceError {
    /// Returns true if the requested file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Create from an object_store error with context about the path.
    pub fn from_object_store(err: object_store::Error, path: &str) -> Self {
        match &err {
            object_store::Error::NotFound { .. } => NamespaceError::NotFound {
                path: path.to_string(),
            },
            _ => NamespaceError::ObjectStore(err),
        }
    }
}

//! Error types for the data store.

use thiserror::Error;

use crate::namespace::NamespaceError;
use crate::resource_id::Collection;

/// Result type for data store operations.
pub type DataStoreResult<T> = Result<T, DataStoreError>;

/// Data store errors.
#[derive(Debug, Error)]
pub enum DataStoreError {
    /// No stored version exists for the resource.
    /// Expected when probing for existence.
    #[error("resource not found: {resource_id}")]
    NotFound { resource_id: String },

    /// The caller's creation timestamp disagrees with the stored one.
    #[error(
        "resource {resource_id} already exists with timestamp {existing_micros}, \
         refusing to write it with timestamp {requested_micros}"
    )]
    Conflict {
        resource_id: String,
        existing_micros: i64,
        requested_micros: i64,
    },

    /// Creation timestamps cannot precede the epoch.
    #[error("invalid timestamp for {resource_id}: {timestamp_micros}")]
    InvalidTimestamp {
        resource_id: String,
        timestamp_micros: i64,
    },

    /// Record type does not belong to the collection of its id.
    #[error("expected a {expected} record{}, got {actual}", for_id(.resource_id))]
    TypeMismatch {
        resource_id: Option<String>,
        expected: Collection,
        actual: Collection,
    },

    /// Collection name is unknown or holds no records.
    #[error("not a supported resource collection: {collection}")]
    UnsupportedCollection { collection: String },

    /// Stored bytes do not parse as the expected record type.
    #[error("failed to decode {resource_id}: {message}")]
    Decode { resource_id: String, message: String },

    /// Record could not be serialized.
    #[error("failed to encode {resource_id}: {message}")]
    Encode { resource_id: String, message: String },

    /// Namespace invariant violated (duplicate versions, bad file names).
    #[error("internal data store error: {message}")]
    Internal { message: String },

    /// Caller supplied an unusable argument.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Malformed pagination token.
    #[error("invalid page token '{token}': {reason}")]
    InvalidToken { token: String, reason: String },

    /// Malformed or misplaced resource id.
    #[error("invalid resource id '{resource_id}': {reason}")]
    InvalidResourceId { resource_id: String, reason: String },

    /// The same callback was subscribed twice.
    #[error("callback is already subscribed")]
    DuplicateSubscription,

    /// No subscription exists for the handle.
    #[error("unknown subscription: {subscription}")]
    UnknownSubscription { subscription: String },

    /// Error from the underlying namespace.
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
}

fn for_id(resource_id: &Option<String>) -> String {
    resource_id
        .as_ref()
        .map(|id| format!(" for {}", id))
        .unwrap_or_default()
}

impl DataStoreError {
    /// Returns true if the resource has no stored version.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for timestamp conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if the namespace holds data this layer cannot trust.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::Internal { .. } | Self::Decode { .. })
    }
}

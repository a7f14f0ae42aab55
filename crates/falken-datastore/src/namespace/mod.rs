//! Namespace abstraction: a hierarchical byte-store of files.
//!
//! The resource store needs only five primitives from its storage medium:
//! write a file, read a file, glob for files, and register/deregister a
//! callback fired when a new file appears. Everything else (local disk,
//! S3, in-memory test doubles) hides behind [`Namespace`].
//!
//! # Path Layout
//!
//! Paths are `/`-separated and relative to the namespace root:
//!
//! ```text
//! projects/p1/brains/b1/resource.0001618000000000
//! ```

pub mod error;
pub mod glob;
pub mod object_store_backend;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::{NamespaceError, NamespaceResult};
pub use glob::PathPattern;
pub use object_store_backend::ObjectStoreNamespace;

/// Handler invoked with the path of every newly created file.
pub type FileCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Opaque handle for a registered [`FileCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(pub(crate) u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback-{}", self.0)
    }
}

/// Parsed namespace specification from config.
///
/// # Examples
///
/// ```text
/// s3://my-bucket/falken/data_store
/// file:///var/lib/falken/data_store
/// memory://  (for testing)
/// ```
#[derive(Debug, Clone)]
pub struct NamespaceSpec {
    /// The scheme (s3, file, memory)
    pub scheme: String,
    /// Bucket name (empty for file://)
    pub bucket: Option<String>,
    /// Base prefix/path within the bucket
    pub prefix: String,
    /// Optional region (for S3)
    pub region: Option<String>,
}

impl NamespaceSpec {
    /// Parse a namespace URL like `s3://bucket/prefix` or `file:///path`.
    pub fn parse(url: &str) -> NamespaceResult<Self> {
        let url = url::Url::parse(url).map_err(|e| NamespaceError::InvalidSpec {
            spec: url.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = url.scheme().to_string();
        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .map(|s| s.to_string());
        // File URLs carry percent-encoded paths; decode them to the real
        // directory name.
        let path = match url.to_file_path() {
            Ok(path) if scheme == "file" => path.to_string_lossy().into_owned(),
            _ => url.path().to_string(),
        };
        let prefix = path.trim_start_matches('/').to_string();

        let region = url
            .query_pairs()
            .find(|(k, _)| k == "region")
            .map(|(_, v)| v.to_string());

        Ok(Self {
            scheme,
            bucket,
            prefix,
            region,
        })
    }

    /// Check if this is a memory namespace (for testing).
    pub fn is_memory(&self) -> bool {
        self.scheme == "memory"
    }

    /// Check if this is a local file namespace.
    pub fn is_file(&self) -> bool {
        self.scheme == "file"
    }
}

/// A hierarchical byte-store.
///
/// Single-file writes and reads, and directory globs, are assumed atomic
/// and immediately visible to every caller sharing the namespace.
#[async_trait]
pub trait Namespace: Send + Sync {
    /// Create or overwrite the file at `path`. Durable on return.
    ///
    /// Registered callbacks fire when the file did not exist before.
    async fn write_file(&self, path: &str, data: Bytes) -> NamespaceResult<()>;

    /// Read the file at `path`.
    ///
    /// # Returns
    ///
    /// - `Ok(Bytes)` with the file contents
    /// - `Err(NamespaceError::NotFound)` if there is no such file
    async fn read_file(&self, path: &str) -> NamespaceResult<Bytes>;

    /// Paths of existing files matching `pattern`, sorted.
    ///
    /// See [`glob`] for the pattern syntax.
    async fn glob(&self, pattern: &str) -> NamespaceResult<Vec<String>>;

    /// Register a handler for newly created files.
    fn add_file_callback(&self, callback: FileCallback) -> CallbackId;

    /// Deregister a handler. Returns false if `id` was not registered.
    fn remove_file_callback(&self, id: CallbackId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_spec() {
        let spec = NamespaceSpec::parse("s3://my-bucket/falken/data_store").unwrap();
        assert_eq!(spec.scheme, "s3");
        assert_eq!(spec.bucket, Some("my-bucket".to_string()));
        assert_eq!(spec.prefix, "falken/data_store");
    }

    #[test]
    fn test_parse_s3_with_region() {
        let spec = NamespaceSpec::parse("s3://my-bucket/prefix?region=us-west-2").unwrap();
        assert_eq!(spec.region, Some("us-west-2".to_string()));
    }

    #[test]
    fn test_parse_file_spec() {
        let spec = NamespaceSpec::parse("file:///tmp/falken-store").unwrap();
        assert!(spec.is_file());
        assert!(spec.bucket.is_none());
        assert_eq!(spec.prefix, "tmp/falken-store");
    }

    #[test]
    fn test_parse_file_spec_decodes_escapes() {
        let spec = NamespaceSpec::parse("file:///tmp/a%20b/data%25store").unwrap();
        assert_eq!(spec.prefix, "tmp/a b/data%store");

        let spec = NamespaceSpec::parse("s3://bucket/a%20b").unwrap();
        assert_eq!(spec.prefix, "a%20b");
    }

    #[test]
    fn test_parse_memory_spec() {
        let spec = NamespaceSpec::parse("memory://").unwrap();
        assert!(spec.is_memory());
    }

    #[test]
    fn test_parse_garbage() {
        let err = NamespaceSpec::parse("not a url").unwrap_err();
        assert!(matches!(err, NamespaceError::InvalidSpec { .. }));
    }
}

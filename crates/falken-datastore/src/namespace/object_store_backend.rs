//! Object store implementation of Namespace.
//!
//! Supports S3, local filesystem, and in-memory via the `object_store` crate.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload};

use super::{
    CallbackId, FileCallback, Namespace, NamespaceError, NamespaceResult, NamespaceSpec,
    PathPattern,
};

/// Namespace backed by `object_store`.
///
/// Supports:
/// - S3 and S3-compatible (MinIO, R2)
/// - Local filesystem
/// - In-memory (for testing)
///
/// File callbacks fire for files created through this instance.
pub struct ObjectStoreNamespace {
    inner: Arc<dyn ObjectStore>,
    /// Base prefix (e.g., "falken/data_store"), without slashes at either end
    base_prefix: String,
    callbacks: RwLock<BTreeMap<CallbackId, FileCallback>>,
    next_callback_id: AtomicU64,
}

impl ObjectStoreNamespace {
    /// Wrap an existing object store.
    pub fn new(inner: Arc<dyn ObjectStore>, base_prefix: &str) -> Self {
        Self {
            inner,
            base_prefix: base_prefix.trim_matches('/').to_string(),
            callbacks: RwLock::new(BTreeMap::new()),
            next_callback_id: AtomicU64::new(1),
        }
    }

    /// Create a namespace from a parsed spec.
    pub fn from_spec(spec: &NamespaceSpec) -> NamespaceResult<Self> {
        match spec.scheme.as_str() {
            "memory" => Ok(Self::new(
                Arc::new(object_store::memory::InMemory::new()),
                &spec.prefix,
            )),
            "file" => {
                let path = if let Some(host) = &spec.bucket {
                    format!("/{}/{}", host, spec.prefix)
                } else {
                    format!("/{}", spec.prefix)
                };
                std::fs::create_dir_all(&path).map_err(|e| NamespaceError::Io {
                    message: format!("failed to create namespace directory {}: {}", path, e),
                })?;
                let local =
                    object_store::local::LocalFileSystem::new_with_prefix(&path).map_err(|e| {
                        NamespaceError::Io {
                            message: format!("failed to create local namespace at {}: {}", path, e),
                        }
                    })?;
                // The prefix already is the root directory.
                Ok(Self::new(Arc::new(local), ""))
            }
            "s3" => {
                let bucket = spec
                    .bucket
                    .as_ref()
                    .ok_or_else(|| NamespaceError::InvalidSpec {
                        spec: format!("s3:///{}", spec.prefix),
                        reason: "S3 URL must include bucket name".to_string(),
                    })?;

                let mut builder = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(false);

                if let Some(region) = &spec.region {
                    builder = builder.with_region(region);
                }

                let s3 = builder.build().map_err(|e| NamespaceError::Io {
                    message: format!("failed to create S3 client: {}", e),
                })?;
                Ok(Self::new(Arc::new(s3), &spec.prefix))
            }
            scheme => Err(NamespaceError::InvalidSpec {
                spec: spec.scheme.clone(),
                reason: format!("unsupported scheme: {}", scheme),
            }),
        }
    }

    /// Create a namespace from a URL string.
    pub fn from_url(url: &str) -> NamespaceResult<Self> {
        let spec = NamespaceSpec::parse(url)?;
        Self::from_spec(&spec)
    }

    /// Create an in-memory namespace for testing.
    pub fn memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), "")
    }

    /// Create an in-memory namespace with a prefix for testing.
    pub fn memory_with_prefix(prefix: &str) -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), prefix)
    }

    fn key(&self, path: &str) -> Path {
        if self.base_prefix.is_empty() {
            Path::from(path)
        } else {
            Path::from(format!("{}/{}", self.base_prefix, path))
        }
    }

    /// Strip the base prefix from an object location.
    fn relative(&self, location: &Path) -> Option<String> {
        let location = location.as_ref();
        if self.base_prefix.is_empty() {
            return Some(location.to_string());
        }
        location
            .strip_prefix(self.base_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| rest.to_string())
    }

    async fn overwrite(&self, key: &Path, path: &str, data: Bytes) -> NamespaceResult<()> {
        self.inner
            .put(key, PutPayload::from_bytes(data))
            .await
            .map_err(|e| NamespaceError::from_object_store(e, path))?;
        Ok(())
    }

    /// Write `data`, returning whether the file is new.
    ///
    /// Tries a create-exclusive put first; an existing file is overwritten.
    async fn put_reporting_creation(&self, path: &str, data: Bytes) -> NamespaceResult<bool> {
        let key = self.key(path);
        let opts = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };

        match self
            .inner
            .put_opts(&key, PutPayload::from_bytes(data.clone()), opts)
            .await
        {
            Ok(_) => Ok(true),
            Err(object_store::Error::AlreadyExists { .. })
            | Err(object_store::Error::Precondition { .. }) => {
                self.overwrite(&key, path, data).await?;
                Ok(false)
            }
            Err(object_store::Error::NotSupported { .. }) => {
                tracing::warn!(
                    path,
                    "Conditional writes not supported by backend, falling back to check-then-put"
                );
                // Racy, best-effort for non-compliant backends.
                let existed = self.inner.head(&key).await.is_ok();
                self.overwrite(&key, path, data).await?;
                Ok(!existed)
            }
            Err(e) => Err(NamespaceError::from_object_store(e, path)),
        }
    }

    fn notify(&self, path: &str) {
        let callbacks: Vec<FileCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for callback in callbacks {
            callback(path);
        }
    }
}

#[async_trait]
impl Namespace for ObjectStoreNamespace {
    async fn write_file(&self, path: &str, data: Bytes) -> NamespaceResult<()> {
        if self.put_reporting_creation(path, data).await? {
            self.notify(path);
        }
        Ok(())
    }

    async fn read_file(&self, path: &str) -> NamespaceResult<Bytes> {
        let key = self.key(path);

        let result = self.inner.get(&key).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => NamespaceError::NotFound {
                path: path.to_string(),
            },
            _ => NamespaceError::Io {
                message: format!("failed to get {}: {}", path, e),
            },
        })?;

        result.bytes().await.map_err(|e| NamespaceError::Io {
            message: format!("failed to read bytes of {}: {}", path, e),
        })
    }

    async fn glob(&self, pattern: &str) -> NamespaceResult<Vec<String>> {
        let compiled = PathPattern::new(pattern)?;
        let literal = compiled.literal_prefix();
        let prefix = match (self.base_prefix.is_empty(), literal.is_empty()) {
            (true, true) => None,
            (true, false) => Some(Path::from(literal)),
            (false, true) => Some(Path::from(self.base_prefix.as_str())),
            (false, false) => Some(Path::from(format!("{}/{}", self.base_prefix, literal))),
        };

        // A literal directory only needs its direct children; everything
        // else walks the subtree under the literal prefix.
        let listed = if compiled.has_literal_directory() {
            self.inner
                .list_with_delimiter(prefix.as_ref())
                .await
                .map(|result| result.objects)
        } else {
            self.inner.list(prefix.as_ref()).try_collect::<Vec<_>>().await
        };
        let entries = match listed {
            Ok(entries) => entries,
            Err(object_store::Error::NotFound { .. }) => Vec::new(),
            Err(e) => {
                return Err(NamespaceError::Io {
                    message: format!("failed to list {}: {}", pattern, e),
                })
            }
        };

        let mut paths: Vec<String> = entries
            .iter()
            .filter_map(|entry| self.relative(&entry.location))
            .filter(|path| compiled.matches(path))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn add_file_callback(&self, callback: FileCallback) -> CallbackId {
        let id = CallbackId(self.next_callback_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, callback);
        id
    }

    fn remove_file_callback(&self, id: CallbackId) -> bool {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }
}

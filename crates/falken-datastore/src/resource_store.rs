//! Resource storage engine on top of a [`Namespace`].
//!
//! Each resource lives in the directory named by its id, as a single file
//! named by its creation timestamp (see [`crate::naming`]). There is no
//! index: reads glob the resource directory, listings glob every directory
//! matched by an id pattern.
//!
//! # Pagination
//!
//! Listings are ordered by `(timestamp, id string)`. A page token records
//! the last entry handed out, `"{timestamp}:{id}"`, and the next page
//! resumes strictly after it. Resources written later carry later
//! timestamps, so pages already returned never change.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::encoder::ResourceEncoder;
use crate::error::{DataStoreError, DataStoreResult};
use crate::naming::{parse_timestamp, resource_glob, resource_path, split_resource_path};
use crate::namespace::Namespace;
use crate::resolver::ResourceResolver;
use crate::resource_id::ResourceId;
use crate::resources::{Record, Resource};

/// Exclusive resume point of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken {
    pub timestamp_micros: i64,
    pub resource_id: String,
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.timestamp_micros, self.resource_id)
    }
}

impl FromStr for PageToken {
    type Err = DataStoreError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| DataStoreError::InvalidToken {
            token: token.to_string(),
            reason: reason.to_string(),
        };

        let (timestamp, resource_id) = token
            .split_once(':')
            .ok_or_else(|| invalid("expected '<timestamp>:<resource id>'"))?;
        let timestamp_micros = timestamp
            .parse()
            .map_err(|_| invalid("timestamp is not an integer"))?;
        if resource_id.is_empty() {
            return Err(invalid("missing resource id"));
        }

        Ok(Self {
            timestamp_micros,
            resource_id: resource_id.to_string(),
        })
    }
}

/// Bounds and paging for [`ResourceStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Only list resources created at or after this time.
    pub min_timestamp_micros: i64,
    /// Token from a previous page; `None` or empty starts from the beginning.
    pub page_token: Option<String>,
    /// Maximum page length. `None` and `Some(0)` both mean unbounded.
    pub page_size: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_timestamp_micros(mut self, min_timestamp_micros: i64) -> Self {
        self.min_timestamp_micros = min_timestamp_micros;
        self
    }

    pub fn with_page_token(mut self, page_token: impl Into<String>) -> Self {
        self.page_token = Some(page_token.into());
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    /// Canonical id strings in `(timestamp, id)` order.
    pub resource_ids: Vec<String>,
    /// Token for the following page, `None` once the listing is exhausted.
    pub next_page_token: Option<String>,
}

/// Stores resources with resource ids in a namespace.
#[derive(Clone)]
pub struct ResourceStore {
    namespace: Arc<dyn Namespace>,
    encoder: ResourceEncoder,
    resolver: ResourceResolver,
}

impl ResourceStore {
    pub fn new(namespace: Arc<dyn Namespace>) -> Self {
        Self {
            namespace,
            encoder: ResourceEncoder,
            resolver: ResourceResolver,
        }
    }

    /// The underlying namespace.
    pub fn namespace(&self) -> &Arc<dyn Namespace> {
        &self.namespace
    }

    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    /// Write `resource` under the id derived from its key fields.
    ///
    /// An unset creation timestamp is filled in with the stored one, or with
    /// the current time for new resources; either way it is written back
    /// into `resource`. A set timestamp must match the stored one.
    ///
    /// # Returns
    ///
    /// - `Ok(ResourceId)` of the written resource
    /// - `Err(DataStoreError::Conflict)` if the timestamps disagree
    pub async fn write(&self, resource: &mut Resource) -> DataStoreResult<ResourceId> {
        let id = self.resolver.to_resource_id(resource)?;
        let requested = self.resolver.timestamp_micros(resource);

        let existing = match self.read_timestamp_micros(&id).await {
            Ok(timestamp) => Some(timestamp),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let timestamp_micros = match (requested, existing) {
            (Some(requested), Some(existing)) if requested != existing => {
                tracing::warn!(
                    resource_id = %id,
                    existing_micros = existing,
                    requested_micros = requested,
                    "refusing to change creation timestamp"
                );
                return Err(DataStoreError::Conflict {
                    resource_id: id.to_string(),
                    existing_micros: existing,
                    requested_micros: requested,
                });
            }
            (Some(requested), _) => requested,
            (None, Some(existing)) => existing,
            (None, None) => chrono::Utc::now().timestamp_micros(),
        };

        if timestamp_micros < 0 {
            return Err(DataStoreError::InvalidTimestamp {
                resource_id: id.to_string(),
                timestamp_micros,
            });
        }
        self.resolver.set_timestamp_micros(resource, timestamp_micros);

        let data = self.encoder.encode(&id, resource)?;
        self.namespace
            .write_file(&resource_path(&id, timestamp_micros), data)
            .await?;

        tracing::debug!(
            resource_id = %id,
            timestamp_micros,
            created = existing.is_none(),
            "wrote resource"
        );
        Ok(id)
    }

    /// Typed [`write`](Self::write); the timestamp is written back into `record`.
    pub async fn write_record<T: Record>(&self, record: &mut T) -> DataStoreResult<ResourceId> {
        let mut resource: Resource = record.clone().into();
        let id = self.write(&mut resource).await?;
        *record = T::try_from(resource)?;
        Ok(id)
    }

    /// Creation timestamp of the stored version of `id`.
    ///
    /// # Returns
    ///
    /// - `Err(DataStoreError::NotFound)` if nothing is stored
    /// - `Err(DataStoreError::Internal)` if the directory holds more than
    ///   one version, or a version file with a malformed name
    pub async fn read_timestamp_micros(&self, id: &ResourceId) -> DataStoreResult<i64> {
        ensure_concrete(id)?;

        let files = self.namespace.glob(&resource_glob(id)).await?;
        let file = match files.as_slice() {
            [] => {
                return Err(DataStoreError::NotFound {
                    resource_id: id.to_string(),
                })
            }
            [file] => file,
            _ => {
                tracing::error!(
                    resource_id = %id,
                    versions = files.len(),
                    "found more than one version file"
                );
                return Err(DataStoreError::Internal {
                    message: format!("found more than one file for resource id \"{}\"", id),
                });
            }
        };

        split_resource_path(file)
            .and_then(|(_, file_name)| parse_timestamp(file_name))
            .ok_or_else(|| DataStoreError::Internal {
                message: format!(
                    "could not translate file name to microsecond timestamp: \"{}\"",
                    file
                ),
            })
    }

    /// Read the stored version of `id`.
    pub async fn read(&self, id: &ResourceId) -> DataStoreResult<Resource> {
        let timestamp_micros = self.read_timestamp_micros(id).await?;
        let data = self
            .namespace
            .read_file(&resource_path(id, timestamp_micros))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    DataStoreError::NotFound {
                        resource_id: id.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;

        tracing::debug!(resource_id = %id, timestamp_micros, "read resource");
        self.encoder.decode(id, &data)
    }

    /// Typed [`read`](Self::read).
    pub async fn read_record<T: Record>(&self, id: &ResourceId) -> DataStoreResult<T> {
        T::try_from(self.read(id).await?).map_err(|e| match e {
            DataStoreError::TypeMismatch {
                expected, actual, ..
            } => DataStoreError::TypeMismatch {
                resource_id: Some(id.to_string()),
                expected,
                actual,
            },
            other => other,
        })
    }

    /// List ids of resources matching `id_glob`, one page at a time.
    ///
    /// `id_glob` may use `*` and `{a,b,c}` in any id segment.
    pub async fn list(
        &self,
        id_glob: &ResourceId,
        options: &ListOptions,
    ) -> DataStoreResult<ListPage> {
        let files = self.namespace.glob(&resource_glob(id_glob)).await?;

        let mut entries = files
            .iter()
            .map(|file| {
                split_resource_path(file)
                    .and_then(|(id, file_name)| Some((parse_timestamp(file_name)?, id)))
                    .ok_or_else(|| DataStoreError::Internal {
                        message: format!(
                            "could not translate file name to microsecond timestamp: \"{}\"",
                            file
                        ),
                    })
            })
            .collect::<DataStoreResult<Vec<(i64, &str)>>>()?;
        entries.sort_unstable();

        let token = options
            .page_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(str::parse::<PageToken>)
            .transpose()?;

        let (lower_bound, token_id) = match &token {
            Some(token) => (
                token.timestamp_micros.max(options.min_timestamp_micros),
                Some(token.resource_id.as_str()),
            ),
            None => (options.min_timestamp_micros, None),
        };
        let limit = options.page_size.filter(|size| *size > 0);

        let mut page = Vec::new();
        let mut last_timestamp = lower_bound;
        let mut consumed = 0;
        for (timestamp, id) in &entries {
            consumed += 1;
            if *timestamp < lower_bound {
                continue;
            }
            if *timestamp == lower_bound && token_id.is_some_and(|token_id| *id <= token_id) {
                continue;
            }

            page.push(id.to_string());
            last_timestamp = *timestamp;
            if limit.is_some_and(|limit| page.len() == limit) {
                break;
            }
        }

        let next_page_token = match page.last() {
            Some(last_id) if consumed < entries.len() => Some(
                PageToken {
                    timestamp_micros: last_timestamp,
                    resource_id: last_id.clone(),
                }
                .to_string(),
            ),
            _ => None,
        };

        tracing::debug!(
            pattern = %id_glob,
            matched = entries.len(),
            returned = page.len(),
            more = next_page_token.is_some(),
            "listed resources"
        );

        Ok(ListPage {
            resource_ids: page,
            next_page_token,
        })
    }
}

fn ensure_concrete(id: &ResourceId) -> DataStoreResult<()> {
    if id.is_pattern() {
        return Err(DataStoreError::InvalidResourceId {
            resource_id: id.to_string(),
            reason: "expected a concrete resource id, got a pattern".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::ObjectStoreNamespace;
    use crate::resources::{Brain, Project};
    use bytes::Bytes;

    fn store() -> ResourceStore {
        ResourceStore::new(Arc::new(ObjectStoreNamespace::memory()))
    }

    fn project(id: &str, created_micros: Option<i64>) -> Resource {
        Project {
            project_id: id.to_string(),
            created_micros,
            ..Default::default()
        }
        .into()
    }

    #[test]
    fn test_page_token_parse() {
        let token: PageToken = "42:projects/p1".parse().unwrap();
        assert_eq!(token.timestamp_micros, 42);
        assert_eq!(token.resource_id, "projects/p1");
        assert_eq!(token.to_string(), "42:projects/p1");

        for bad in ["", "42", "abc:projects/p1", "42:"] {
            let err = bad.parse::<PageToken>().unwrap_err();
            assert!(matches!(err, DataStoreError::InvalidToken { .. }), "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_write_mints_timestamp() {
        let store = store();
        let mut p = project("p1", None);

        let before = chrono::Utc::now().timestamp_micros();
        let id = store.write(&mut p).await.unwrap();
        let minted = store.resolver().timestamp_micros(&p).unwrap();

        assert!(minted >= before);
        assert_eq!(store.read_timestamp_micros(&id).await.unwrap(), minted);
        assert_eq!(store.read(&id).await.unwrap(), p);
    }

    #[tokio::test]
    async fn test_epoch_zero_is_a_valid_timestamp() {
        let store = store();
        let mut p = project("p1", Some(0));

        let id = store.write(&mut p).await.unwrap();
        assert_eq!(store.read_timestamp_micros(&id).await.unwrap(), 0);

        let mut again = project("p1", None);
        store.write(&mut again).await.unwrap();
        assert_eq!(store.resolver().timestamp_micros(&again), Some(0));
    }

    #[tokio::test]
    async fn test_negative_timestamp_is_rejected() {
        let err = store().write(&mut project("p1", Some(-1))).await.unwrap_err();
        assert!(matches!(err, DataStoreError::InvalidTimestamp { .. }));
    }

    #[tokio::test]
    async fn test_read_missing() {
        let id: ResourceId = "projects/nope".parse().unwrap();
        let err = store().read(&id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_read_rejects_patterns() {
        let id: ResourceId = "projects/*".parse().unwrap();
        let err = store().read(&id).await.unwrap_err();
        assert!(matches!(err, DataStoreError::InvalidResourceId { .. }));
    }

    #[tokio::test]
    async fn test_write_rejects_ids_the_store_would_escape() {
        let store = store();
        for bad in ["a~b", "100%"] {
            let err = store.write(&mut project(bad, None)).await.unwrap_err();
            assert!(
                matches!(err, DataStoreError::InvalidResourceId { .. }),
                "{}",
                bad
            );
        }
        let written = store.namespace().glob("projects/*/resource.*").await.unwrap();
        assert!(written.is_empty(), "{:?}", written);

        let mut dotted = project("model-v1.2_x", None);
        let id = store.write(&mut dotted).await.unwrap();
        assert_eq!(store.read(&id).await.unwrap(), dotted);
        store.write(&mut dotted).await.unwrap();
        let versions = store.namespace().glob("projects/*/resource.*").await.unwrap();
        assert_eq!(versions.len(), 1);
    }

    #[tokio::test]
    async fn test_two_versions_is_an_integrity_error() {
        let store = store();
        let ns = store.namespace().clone();
        ns.write_file("projects/p1/resource.0000000000000001", Bytes::from("{}"))
            .await
            .unwrap();
        ns.write_file("projects/p1/resource.0000000000000002", Bytes::from("{}"))
            .await
            .unwrap();

        let id: ResourceId = "projects/p1".parse().unwrap();
        let err = store.read(&id).await.unwrap_err();
        assert!(matches!(err, DataStoreError::Internal { .. }));

        let err = store.write(&mut project("p1", None)).await.unwrap_err();
        assert!(matches!(err, DataStoreError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_malformed_version_name_is_an_integrity_error() {
        let store = store();
        store
            .namespace()
            .write_file("projects/p1/resource.latest", Bytes::from("{}"))
            .await
            .unwrap();

        let id: ResourceId = "projects/p1".parse().unwrap();
        let err = store.read_timestamp_micros(&id).await.unwrap_err();
        assert!(matches!(err, DataStoreError::Internal { .. }));

        let glob: ResourceId = "projects/*".parse().unwrap();
        let err = store.list(&glob, &ListOptions::new()).await.unwrap_err();
        assert!(matches!(err, DataStoreError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_typed_write_and_read() {
        let store = store();
        let mut brain = Brain {
            project_id: "p1".into(),
            brain_id: "b1".into(),
            ..Default::default()
        };

        let id = store.write_record(&mut brain).await.unwrap();
        assert!(brain.created_micros.is_some());

        let read: Brain = store.read_record(&id).await.unwrap();
        assert_eq!(read, brain);

        let err = store.read_record::<Project>(&id).await.unwrap_err();
        assert!(matches!(err, DataStoreError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_list_zero_page_size_is_unbounded() {
        let store = store();
        for (i, name) in ["p1", "p2", "p3"].iter().enumerate() {
            store
                .write(&mut project(name, Some(i as i64 + 1)))
                .await
                .unwrap();
        }

        let glob: ResourceId = "projects/*".parse().unwrap();
        let page = store
            .list(&glob, &ListOptions::new().with_page_size(0))
            .await
            .unwrap();
        assert_eq!(page.resource_ids.len(), 3);
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_list_min_timestamp_is_inclusive() {
        let store = store();
        for (ts, name) in [(10, "a"), (20, "b"), (30, "c")] {
            store.write(&mut project(name, Some(ts))).await.unwrap();
        }

        let glob: ResourceId = "projects/*".parse().unwrap();
        let page = store
            .list(&glob, &ListOptions::new().with_min_timestamp_micros(20))
            .await
            .unwrap();
        assert_eq!(page.resource_ids, vec!["projects/b", "projects/c"]);
    }

    #[tokio::test]
    async fn test_list_ties_break_on_id() {
        let store = store();
        for name in ["c", "a", "b"] {
            store.write(&mut project(name, Some(5))).await.unwrap();
        }

        let glob: ResourceId = "projects/*".parse().unwrap();
        let first = store
            .list(&glob, &ListOptions::new().with_page_size(2))
            .await
            .unwrap();
        assert_eq!(first.resource_ids, vec!["projects/a", "projects/b"]);
        assert_eq!(first.next_page_token.as_deref(), Some("5:projects/b"));

        let second = store
            .list(
                &glob,
                &ListOptions::new()
                    .with_page_size(2)
                    .with_page_token(first.next_page_token.unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(second.resource_ids, vec!["projects/c"]);
        assert!(second.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_list_bad_token() {
        let glob: ResourceId = "projects/*".parse().unwrap();
        let err = store()
            .list(&glob, &ListOptions::new().with_page_token("garbage"))
            .await
            .unwrap_err();
        assert!(matches!(err, DataStoreError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn test_list_empty() {
        let glob: ResourceId = "projects/*".parse().unwrap();
        let page = store().list(&glob, &ListOptions::new()).await.unwrap();
        assert_eq!(page, ListPage::default());
    }
}

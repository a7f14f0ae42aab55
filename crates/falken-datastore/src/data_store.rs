//! Public data store facade.
//!
//! Wraps a [`ResourceStore`] with typed convenience reads, most-recent
//! lookups, and file subscriptions that are torn down with the store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::DataStoreConfig;
use crate::error::{DataStoreError, DataStoreResult};
use crate::namespace::{CallbackId, FileCallback, Namespace, ObjectStoreNamespace};
use crate::resolver::hash_assignment_id;
use crate::resource_id::ResourceId;
use crate::resource_store::{ListOptions, ListPage, ResourceStore};
use crate::resources::{Assignment, Brain, Record, Resource, Session, Snapshot};

/// Handle returned by [`DataStore::subscribe`].
pub type SubscriptionId = CallbackId;

/// Stores and retrieves resources by id.
///
/// Safe to share between tasks; every operation goes straight to the
/// namespace.
pub struct DataStore {
    store: ResourceStore,
    subscriptions: Mutex<BTreeMap<SubscriptionId, FileCallback>>,
}

impl DataStore {
    pub fn new(namespace: Arc<dyn Namespace>) -> Self {
        Self {
            store: ResourceStore::new(namespace),
            subscriptions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Open the namespace named by `config.url`.
    pub fn from_config(config: &DataStoreConfig) -> DataStoreResult<Self> {
        let namespace = ObjectStoreNamespace::from_url(&config.url)?;
        tracing::debug!(url = %config.url, "opened data store");
        Ok(Self::new(Arc::new(namespace)))
    }

    /// In-memory data store for testing.
    pub fn memory() -> Self {
        Self::new(Arc::new(ObjectStoreNamespace::memory()))
    }

    /// The underlying resource store.
    pub fn resources(&self) -> &ResourceStore {
        &self.store
    }

    pub fn namespace(&self) -> &Arc<dyn Namespace> {
        self.store.namespace()
    }

    pub fn to_resource_id(&self, resource: &Resource) -> DataStoreResult<ResourceId> {
        self.store.resolver().to_resource_id(resource)
    }

    /// See [`ResourceStore::write`].
    pub async fn write(&self, resource: &mut Resource) -> DataStoreResult<ResourceId> {
        self.store.write(resource).await
    }

    /// See [`ResourceStore::write_record`].
    pub async fn write_record<T: Record>(&self, record: &mut T) -> DataStoreResult<ResourceId> {
        self.store.write_record(record).await
    }

    pub async fn read(&self, id: &ResourceId) -> DataStoreResult<Resource> {
        self.store.read(id).await
    }

    /// Read `id` as a `T`, failing with `TypeMismatch` for other records.
    pub async fn read_as<T: Record>(&self, id: &ResourceId) -> DataStoreResult<T> {
        self.store.read_record(id).await
    }

    pub async fn read_timestamp_micros(&self, id: &ResourceId) -> DataStoreResult<i64> {
        self.store.read_timestamp_micros(id).await
    }

    /// See [`ResourceStore::list`].
    pub async fn list(
        &self,
        id_glob: &ResourceId,
        options: &ListOptions,
    ) -> DataStoreResult<ListPage> {
        self.store.list(id_glob, options).await
    }

    pub async fn read_brain(&self, project_id: &str, brain_id: &str) -> DataStoreResult<Brain> {
        let id = ResourceId::builder()
            .project(project_id)
            .brain(brain_id)
            .build()?;
        self.read_as(&id).await
    }

    pub async fn read_session(
        &self,
        project_id: &str,
        brain_id: &str,
        session_id: &str,
    ) -> DataStoreResult<Session> {
        let id = ResourceId::builder()
            .project(project_id)
            .brain(brain_id)
            .session(session_id)
            .build()?;
        self.read_as(&id).await
    }

    pub async fn read_snapshot(
        &self,
        project_id: &str,
        brain_id: &str,
        snapshot_id: &str,
    ) -> DataStoreResult<Snapshot> {
        let id = ResourceId::builder()
            .project(project_id)
            .brain(brain_id)
            .snapshot(snapshot_id)
            .build()?;
        self.read_as(&id).await
    }

    /// Read an assignment by its unhashed id.
    pub async fn read_assignment(
        &self,
        project_id: &str,
        brain_id: &str,
        session_id: &str,
        assignment_id: &str,
    ) -> DataStoreResult<Assignment> {
        let id = ResourceId::builder()
            .project(project_id)
            .brain(brain_id)
            .session(session_id)
            .assignment(hash_assignment_id(assignment_id))
            .build()?;
        self.read_as(&id).await
    }

    /// Newest resource matching `id_glob`, `None` if nothing matches.
    pub async fn get_most_recent(
        &self,
        id_glob: &ResourceId,
    ) -> DataStoreResult<Option<ResourceId>> {
        let page = self.store.list(id_glob, &ListOptions::new()).await?;
        page.resource_ids.last().map(|id| id.parse()).transpose()
    }

    /// Newest snapshot of a brain, `None` if it has none.
    pub async fn get_most_recent_snapshot(
        &self,
        project_id: &str,
        brain_id: &str,
    ) -> DataStoreResult<Option<Snapshot>> {
        let id_glob = ResourceId::builder()
            .project(project_id)
            .brain(brain_id)
            .snapshot("*")
            .build()?;

        match self.get_most_recent(&id_glob).await? {
            Some(id) => Ok(Some(self.read_as(&id).await?)),
            None => Ok(None),
        }
    }

    /// Invoke `callback` with the path of every file created in the namespace.
    ///
    /// Callbacks see every new file; filter with
    /// [`parse_resource_path`](crate::naming::parse_resource_path).
    ///
    /// # Returns
    ///
    /// - `Ok(SubscriptionId)` to pass to [`unsubscribe`](Self::unsubscribe)
    /// - `Err(DataStoreError::DuplicateSubscription)` if this very callback
    ///   is already subscribed
    pub fn subscribe(&self, callback: FileCallback) -> DataStoreResult<SubscriptionId> {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if subscriptions
            .values()
            .any(|existing| std::ptr::addr_eq(Arc::as_ptr(existing), Arc::as_ptr(&callback)))
        {
            return Err(DataStoreError::DuplicateSubscription);
        }

        let id = self.namespace().add_file_callback(callback.clone());
        subscriptions.insert(id, callback);
        tracing::info!(subscription = %id, "subscribed to new files");
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> DataStoreResult<()> {
        let removed = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        if removed.is_none() {
            return Err(DataStoreError::UnknownSubscription {
                subscription: id.to_string(),
            });
        }
        self.namespace().remove_file_callback(id);
        tracing::info!(subscription = %id, "unsubscribed from new files");
        Ok(())
    }

    /// Remove every subscription made through this store.
    pub fn unsubscribe_all(&self) {
        let subscriptions = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        for id in subscriptions.into_keys() {
            self.namespace().remove_file_callback(id);
            tracing::info!(subscription = %id, "unsubscribed from new files");
        }
    }

    /// Number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for DataStore {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Project;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, FileCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let callback: FileCallback = Arc::new(move |_path: &str| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[tokio::test]
    async fn test_read_brain() {
        let store = DataStore::memory();
        let mut brain = Brain {
            project_id: "p1".into(),
            brain_id: "b1".into(),
            display_name: "Pilot".into(),
            ..Default::default()
        };
        store.write_record(&mut brain).await.unwrap();

        let read = store.read_brain("p1", "b1").await.unwrap();
        assert_eq!(read, brain);
        assert!(store.read_brain("p1", "b2").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_read_assignment_hashes_id() {
        let store = DataStore::memory();
        let mut assignment = Assignment {
            project_id: "p1".into(),
            brain_id: "b1".into(),
            session_id: "s1".into(),
            assignment_id: "{\"learning_rate\": 0.1}".into(),
            ..Default::default()
        };
        store.write_record(&mut assignment).await.unwrap();

        let read = store
            .read_assignment("p1", "b1", "s1", "{\"learning_rate\": 0.1}")
            .await
            .unwrap();
        assert_eq!(read.assignment_id, assignment.assignment_id);
    }

    #[tokio::test]
    async fn test_most_recent_empty() {
        let store = DataStore::memory();
        assert!(store
            .get_most_recent_snapshot("p1", "b1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_subscription() {
        let store = DataStore::memory();
        let (_, callback) = counter();

        store.subscribe(callback.clone()).unwrap();
        let err = store.subscribe(callback).unwrap_err();
        assert!(matches!(err, DataStoreError::DuplicateSubscription));
        assert_eq!(store.subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown() {
        let store = DataStore::memory();
        let (_, callback) = counter();
        let id = store.subscribe(callback).unwrap();

        store.unsubscribe(id).unwrap();
        let err = store.unsubscribe(id).unwrap_err();
        assert!(matches!(err, DataStoreError::UnknownSubscription { .. }));
    }

    #[tokio::test]
    async fn test_subscription_fires_on_new_resources_only() {
        let store = DataStore::memory();
        let (count, callback) = counter();
        store.subscribe(callback).unwrap();

        let mut project: Resource = Project {
            project_id: "p1".into(),
            ..Default::default()
        }
        .into();
        store.write(&mut project).await.unwrap();
        store.write(&mut project).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_tears_down_subscriptions() {
        let namespace: Arc<dyn Namespace> = Arc::new(ObjectStoreNamespace::memory());
        let (count, callback) = counter();
        {
            let store = DataStore::new(namespace.clone());
            store.subscribe(callback).unwrap();
        }

        namespace
            .write_file("projects/p1/notes", bytes::Bytes::from("x"))
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

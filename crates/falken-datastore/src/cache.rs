//! Read-through cache of brains.
//!
//! Brains never change once written, so cached entries need no
//! invalidation. Misses are not cached.

use std::sync::Arc;

use moka::future::Cache;

use crate::config::DataStoreConfig;
use crate::data_store::DataStore;
use crate::error::DataStoreResult;
use crate::resources::Brain;

/// Caches brains by `(project_id, brain_id)`.
#[derive(Clone)]
pub struct BrainCache {
    data_store: Arc<DataStore>,
    brains: Cache<(String, String), Arc<Brain>>,
}

impl BrainCache {
    pub fn new(data_store: Arc<DataStore>, max_entries: u64) -> Self {
        Self {
            data_store,
            brains: Cache::new(max_entries),
        }
    }

    pub fn from_config(data_store: Arc<DataStore>, config: &DataStoreConfig) -> Self {
        Self::new(data_store, config.brain_cache_size)
    }

    /// Cached brain, read from the data store on a miss.
    pub async fn get_brain(&self, project_id: &str, brain_id: &str) -> DataStoreResult<Arc<Brain>> {
        let key = (project_id.to_string(), brain_id.to_string());
        if let Some(brain) = self.brains.get(&key).await {
            return Ok(brain);
        }

        let brain = Arc::new(self.data_store.read_brain(project_id, brain_id).await?);
        self.brains.insert(key, brain.clone()).await;
        tracing::debug!(project_id, brain_id, "cached brain");
        Ok(brain)
    }

    /// Cached brain spec.
    pub async fn get_brain_spec(
        &self,
        project_id: &str,
        brain_id: &str,
    ) -> DataStoreResult<serde_json::Value> {
        Ok(self.get_brain(project_id, brain_id).await?.brain_spec.clone())
    }

    /// Drop every cached brain.
    pub fn clear(&self) {
        self.brains.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    async fn store_with_brain() -> Arc<DataStore> {
        let store = Arc::new(DataStore::memory());
        let mut brain = Brain {
            project_id: "p1".into(),
            brain_id: "b1".into(),
            brain_spec: serde_json::json!({"observation": {"player": "position"}}),
            ..Default::default()
        };
        store.write_record(&mut brain).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_hit_skips_the_store() {
        let store = store_with_brain().await;
        let cache = BrainCache::new(store.clone(), 8);

        let first = cache.get_brain("p1", "b1").await.unwrap();

        // Clobber the stored bytes; a cache hit never looks at them.
        let timestamp = store
            .read_timestamp_micros(&"projects/p1/brains/b1".parse().unwrap())
            .await
            .unwrap();
        store
            .namespace()
            .write_file(
                &format!("projects/p1/brains/b1/resource.{:016}", timestamp),
                Bytes::from("not json"),
            )
            .await
            .unwrap();

        let second = cache.get_brain("p1", "b1").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.get_brain_spec("p1", "b1").await.unwrap(),
            serde_json::json!({"observation": {"player": "position"}})
        );

        cache.clear();
        assert!(cache.get_brain("p1", "b1").await.is_err());
    }

    #[tokio::test]
    async fn test_miss_is_not_cached() {
        let store = Arc::new(DataStore::memory());
        let cache = BrainCache::new(store.clone(), 8);
        assert!(cache.get_brain("p1", "b1").await.unwrap_err().is_not_found());

        let mut brain = Brain {
            project_id: "p1".into(),
            brain_id: "b1".into(),
            ..Default::default()
        };
        store.write_record(&mut brain).await.unwrap();
        assert!(cache.get_brain("p1", "b1").await.is_ok());
    }
}

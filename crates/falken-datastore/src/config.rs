//! Data store configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for [`DataStore`](crate::DataStore) and [`Storage`](crate::Storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStoreConfig {
    /// Namespace URL (`memory://`, `file:///path`, `s3://bucket/prefix`).
    #[serde(default = "default_url")]
    pub url: String,

    /// Seconds without data after which a session counts as stale.
    #[serde(default = "default_session_stale_secs")]
    pub session_stale_secs: u64,

    /// Capacity of the brain cache.
    #[serde(default = "default_brain_cache_size")]
    pub brain_cache_size: u64,
}

fn default_url() -> String {
    let root = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("falken")
        .join("data_store");
    let root = std::path::absolute(&root).unwrap_or(root);
    url::Url::from_directory_path(&root)
        .map(String::from)
        .unwrap_or_else(|_| format!("file://{}", root.display()))
}

fn default_session_stale_secs() -> u64 {
    600
}

fn default_brain_cache_size() -> u64 {
    512
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            session_stale_secs: default_session_stale_secs(),
            brain_cache_size: default_brain_cache_size(),
        }
    }
}

impl DataStoreConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `FALKEN_DATA_STORE_URL` | Namespace URL |
    /// | `FALKEN_SESSION_STALE_SECONDS` | Session staleness window (default: 600) |
    /// | `FALKEN_BRAIN_CACHE_SIZE` | Brain cache capacity (default: 512) |
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("FALKEN_DATA_STORE_URL").unwrap_or_else(|_| default_url()),
            session_stale_secs: std::env::var("FALKEN_SESSION_STALE_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_session_stale_secs),
            brain_cache_size: std::env::var("FALKEN_BRAIN_CACHE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_brain_cache_size),
        }
    }

    /// In-memory namespace, for tests.
    pub fn memory() -> Self {
        Self::default().with_url("memory://")
    }

    /// Set the namespace URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the session staleness window.
    pub fn with_session_stale_secs(mut self, secs: u64) -> Self {
        self.session_stale_secs = secs;
        self
    }

    /// Set the brain cache capacity.
    pub fn with_brain_cache_size(mut self, size: u64) -> Self {
        self.brain_cache_size = size;
        self
    }

    pub fn session_stale_after(&self) -> Duration {
        Duration::from_secs(self.session_stale_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var("FALKEN_DATA_STORE_URL");
        std::env::remove_var("FALKEN_SESSION_STALE_SECONDS");
        std::env::remove_var("FALKEN_BRAIN_CACHE_SIZE");
    }

    #[test]
    fn test_defaults() {
        let config = DataStoreConfig::default();
        assert!(config.url.starts_with("file://"));
        assert!(config.url.contains("falken"));
        assert_eq!(config.session_stale_after(), Duration::from_secs(600));
        assert_eq!(config.brain_cache_size, 512);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: DataStoreConfig =
            serde_json::from_str(r#"{"url": "memory://", "brain_cache_size": 8}"#).unwrap();
        assert_eq!(config.url, "memory://");
        assert_eq!(config.brain_cache_size, 8);
        assert_eq!(config.session_stale_secs, 600);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        std::env::set_var("FALKEN_DATA_STORE_URL", "s3://bucket/falken");
        std::env::set_var("FALKEN_SESSION_STALE_SECONDS", "30");
        std::env::set_var("FALKEN_BRAIN_CACHE_SIZE", "not a number");

        let config = DataStoreConfig::from_env();
        assert_eq!(config.url, "s3://bucket/falken");
        assert_eq!(config.session_stale_secs, 30);
        assert_eq!(config.brain_cache_size, 512);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_unset() {
        clear_env();
        let config = DataStoreConfig::from_env();
        assert_eq!(config.url, DataStoreConfig::default().url);
        assert_eq!(config.session_stale_secs, 600);
    }
}

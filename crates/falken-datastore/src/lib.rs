//! Versioned, hierarchical resource storage for the Falken training service.
//!
//! This crate persists typed records (projects, brains, sessions, episode
//! chunks, models, evaluations) in a namespaced byte-store, providing:
//!
//! - Hierarchical resource ids (`projects/p1/brains/b1/sessions/s1`)
//! - Write-once creation timestamps with conflict detection
//! - Timestamp-ordered, resumable listings over id patterns
//! - Notification of newly written files
//! - Session bookkeeping for the learner and a brain read cache
//!
//! # Quick Start
//!
//! ```no_run
//! use falken_datastore::{Brain, DataStore, DataStoreConfig};
//!
//! # async fn example() -> falken_datastore::DataStoreResult<()> {
//! let store = DataStore::from_config(&DataStoreConfig::from_env())?;
//!
//! let mut brain = Brain {
//!     project_id: "p1".into(),
//!     brain_id: "b1".into(),
//!     ..Default::default()
//! };
//! let id = store.write_record(&mut brain).await?;
//!
//! let read: Brain = store.read_as(&id).await?;
//! assert_eq!(read.created_micros, brain.created_micros);
//! # Ok(())
//! # }
//! ```
//!
//! # Storage Layout
//!
//! Every resource is a directory holding a single file named by its
//! creation timestamp:
//!
//! ```text
//! projects/p1/brains/b1/resource.0001618000000000
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `FALKEN_DATA_STORE_URL` | Namespace URL (`memory://`, `file:///path`, `s3://bucket/prefix`) |
//! | `FALKEN_SESSION_STALE_SECONDS` | Session staleness window (default: 600) |
//! | `FALKEN_BRAIN_CACHE_SIZE` | Brain cache capacity (default: 512) |

pub mod cache;
pub mod config;
pub mod data_store;
pub mod encoder;
pub mod error;
pub mod namespace;
pub mod naming;
pub mod resolver;
pub mod resource_id;
pub mod resource_store;
pub mod resources;
pub mod storage;

// Re-export main types
pub use cache::BrainCache;
pub use config::DataStoreConfig;
pub use data_store::{DataStore, SubscriptionId};
pub use encoder::ResourceEncoder;
pub use error::{DataStoreError, DataStoreResult};
pub use namespace::{
    CallbackId, FileCallback, Namespace, NamespaceError, NamespaceResult, NamespaceSpec,
    ObjectStoreNamespace,
};
pub use naming::parse_resource_path;
pub use resolver::{hash_assignment_id, ResourceResolver};
pub use resource_id::{Collection, ResourceId, ResourceIdBuilder};
pub use resource_store::{ListOptions, ListPage, PageToken, ResourceStore};
pub use resources::{
    Assignment, Brain, EpisodeChunk, LatencyStats, Model, OfflineEvaluation, OnlineEvaluation,
    Project, Record, Resource, SerializedModel, Session, Snapshot, SnapshotParents, Status,
    StatusCode,
};
pub use storage::{NewModel, SessionState, Storage};

//! Typed records persisted by the data store.
//!
//! One struct per collection, plus the [`Resource`] union over all of them.
//! Every record carries `created_micros`, the creation timestamp fixed by
//! the first successful write; `None` means "not yet stored".

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DataStoreError;
use crate::resource_id::Collection;

/// Coarse status attached to sessions and assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    #[default]
    Ok,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default)]
    pub message: String,
}

/// Named latency measurements, in milliseconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencyStats {
    #[serde(default)]
    pub millis: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Brain {
    pub project_id: String,
    pub brain_id: String,
    #[serde(default)]
    pub display_name: String,
    /// Observation/action specification, opaque to the store.
    #[serde(default)]
    pub brain_spec: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

/// Parentage of one snapshot in a snapshot's ancestry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotParents {
    pub snapshot_id: String,
    #[serde(default)]
    pub parent_snapshot_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub project_id: String,
    pub brain_id: String,
    pub snapshot_id: String,
    /// Session that produced this snapshot.
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub ancestor_snapshot_ids: Vec<SnapshotParents>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Session {
    pub project_id: String,
    pub brain_id: String,
    pub session_id: String,
    #[serde(default)]
    pub starting_snapshot_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_data_received_micros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_micros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeChunk {
    pub project_id: String,
    pub brain_id: String,
    pub session_id: String,
    pub episode_id: String,
    pub chunk_id: i64,
    /// Recorded steps, opaque to the store.
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OnlineEvaluation {
    pub project_id: String,
    pub brain_id: String,
    pub session_id: String,
    pub episode_id: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Assignment {
    pub project_id: String,
    pub brain_id: String,
    pub session_id: String,
    /// Free-form and potentially long; hashed before use as a path segment.
    pub assignment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    pub project_id: String,
    pub brain_id: String,
    pub session_id: String,
    pub model_id: String,
    #[serde(default)]
    pub model_path: String,
    #[serde(default)]
    pub compressed_model_path: String,
    #[serde(default)]
    pub assignment_id: String,
    #[serde(default)]
    pub episode_id: String,
    #[serde(default)]
    pub episode_chunk_id: i64,
    #[serde(default)]
    pub training_examples_completed: i64,
    #[serde(default)]
    pub max_training_examples: i64,
    #[serde(default)]
    pub most_recent_demo_time_micros: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_stats: Option<LatencyStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SerializedModel {
    pub project_id: String,
    pub brain_id: String,
    pub session_id: String,
    pub model_id: String,
    #[serde(default)]
    pub packaged_model_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OfflineEvaluation {
    pub project_id: String,
    pub brain_id: String,
    pub session_id: String,
    pub model_id: String,
    /// Version of the evaluation set the score was computed on.
    pub offline_evaluation_id: i64,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_stats: Option<LatencyStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_micros: Option<i64>,
}

/// A record of any supported collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Project(Project),
    Brain(Brain),
    Snapshot(Snapshot),
    Session(Session),
    EpisodeChunk(EpisodeChunk),
    OnlineEvaluation(OnlineEvaluation),
    Assignment(Assignment),
    Model(Model),
    SerializedModel(SerializedModel),
    OfflineEvaluation(OfflineEvaluation),
}

/// Implemented by every record struct.
pub trait Record:
    Clone + Serialize + DeserializeOwned + Into<Resource> + TryFrom<Resource, Error = DataStoreError>
{
    /// Collection holding records of this type.
    const COLLECTION: Collection;
}

impl Resource {
    /// Collection this record belongs to.
    pub fn collection(&self) -> Collection {
        match self {
            Resource::Project(_) => Collection::Projects,
            Resource::Brain(_) => Collection::Brains,
            Resource::Snapshot(_) => Collection::Snapshots,
            Resource::Session(_) => Collection::Sessions,
            Resource::EpisodeChunk(_) => Collection::Chunks,
            Resource::OnlineEvaluation(_) => Collection::OnlineEvaluations,
            Resource::Assignment(_) => Collection::Assignments,
            Resource::Model(_) => Collection::Models,
            Resource::SerializedModel(_) => Collection::SerializedModels,
            Resource::OfflineEvaluation(_) => Collection::OfflineEvaluations,
        }
    }
}

fn mismatch(expected: Collection, actual: &Resource) -> DataStoreError {
    DataStoreError::TypeMismatch {
        resource_id: None,
        expected,
        actual: actual.collection(),
    }
}

impl Record for Project {
    const COLLECTION: Collection = Collection::Projects;
}

impl From<Project> for Resource {
    fn from(record: Project) -> Self {
        Resource::Project(record)
    }
}

impl TryFrom<Resource> for Project {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::Project(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

impl Record for Brain {
    const COLLECTION: Collection = Collection::Brains;
}

impl From<Brain> for Resource {
    fn from(record: Brain) -> Self {
        Resource::Brain(record)
    }
}

impl TryFrom<Resource> for Brain {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::Brain(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

impl Record for Snapshot {
    const COLLECTION: Collection = Collection::Snapshots;
}

impl From<Snapshot> for Resource {
    fn from(record: Snapshot) -> Self {
        Resource::Snapshot(record)
    }
}

impl TryFrom<Resource> for Snapshot {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::Snapshot(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

impl Record for Session {
    const COLLECTION: Collection = Collection::Sessions;
}

impl From<Session> for Resource {
    fn from(record: Session) -> Self {
        Resource::Session(record)
    }
}

impl TryFrom<Resource> for Session {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::Session(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

impl Record for EpisodeChunk {
    const COLLECTION: Collection = Collection::Chunks;
}

impl From<EpisodeChunk> for Resource {
    fn from(record: EpisodeChunk) -> Self {
        Resource::EpisodeChunk(record)
    }
}

impl TryFrom<Resource> for EpisodeChunk {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::EpisodeChunk(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

impl Record for OnlineEvaluation {
    const COLLECTION: Collection = Collection::OnlineEvaluations;
}

impl From<OnlineEvaluation> for Resource {
    fn from(record: OnlineEvaluation) -> Self {
        Resource::OnlineEvaluation(record)
    }
}

impl TryFrom<Resource> for OnlineEvaluation {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::OnlineEvaluation(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

impl Record for Assignment {
    const COLLECTION: Collection = Collection::Assignments;
}

impl From<Assignment> for Resource {
    fn from(record: Assignment) -> Self {
        Resource::Assignment(record)
    }
}

impl TryFrom<Resource> for Assignment {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::Assignment(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

impl Record for Model {
    const COLLECTION: Collection = Collection::Models;
}

impl From<Model> for Resource {
    fn from(record: Model) -> Self {
        Resource::Model(record)
    }
}

impl TryFrom<Resource> for Model {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::Model(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

impl Record for SerializedModel {
    const COLLECTION: Collection = Collection::SerializedModels;
}

impl From<SerializedModel> for Resource {
    fn from(record: SerializedModel) -> Self {
        Resource::SerializedModel(record)
    }
}

impl TryFrom<Resource> for SerializedModel {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::SerializedModel(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

impl Record for OfflineEvaluation {
    const COLLECTION: Collection = Collection::OfflineEvaluations;
}

impl From<OfflineEvaluation> for Resource {
    fn from(record: OfflineEvaluation) -> Self {
        Resource::OfflineEvaluation(record)
    }
}

impl TryFrom<Resource> for OfflineEvaluation {
    type Error = DataStoreError;

    fn try_from(resource: Resource) -> Result<Self, Self::Error> {
        match resource {
            Resource::OfflineEvaluation(record) => Ok(record),
            other => Err(mismatch(Self::COLLECTION, &other)),
        }
    }
}

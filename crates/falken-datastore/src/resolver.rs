//! Derives resource ids from records and manages their timestamps.

use sha2::{Digest, Sha256};

use crate::error::DataStoreResult;
use crate::resource_id::{Collection, ResourceId};
use crate::resources::Resource;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceResolver;

impl ResourceResolver {
    /// Build the id of `resource` from its key fields.
    ///
    /// Assignment ids are hashed since they can get arbitrarily long.
    pub fn to_resource_id(&self, resource: &Resource) -> DataStoreResult<ResourceId> {
        use Collection::*;

        let parts: Vec<(Collection, String)> = match resource {
            Resource::Project(r) => vec![(Projects, r.project_id.clone())],
            Resource::Brain(r) => vec![
                (Projects, r.project_id.clone()),
                (Brains, r.brain_id.clone()),
            ],
            Resource::Snapshot(r) => vec![
                (Projects, r.project_id.clone()),
                (Brains, r.brain_id.clone()),
                (Snapshots, r.snapshot_id.clone()),
            ],
            Resource::Session(r) => vec![
                (Projects, r.project_id.clone()),
                (Brains, r.brain_id.clone()),
                (Sessions, r.session_id.clone()),
            ],
            Resource::EpisodeChunk(r) => vec![
                (Projects, r.project_id.clone()),
                (Brains, r.brain_id.clone()),
                (Sessions, r.session_id.clone()),
                (Episodes, r.episode_id.clone()),
                (Chunks, r.chunk_id.to_string()),
            ],
            Resource::OnlineEvaluation(r) => vec![
                (Projects, r.project_id.clone()),
                (Brains, r.brain_id.clone()),
                (Sessions, r.session_id.clone()),
                (OnlineEvaluations, r.episode_id.clone()),
            ],
            Resource::Assignment(r) => vec![
                (Projects, r.project_id.clone()),
                (Brains, r.brain_id.clone()),
                (Sessions, r.session_id.clone()),
                (Assignments, hash_assignment_id(&r.assignment_id)),
            ],
            Resource::Model(r) => vec![
                (Projects, r.project_id.clone()),
                (Brains, r.brain_id.clone()),
                (Sessions, r.session_id.clone()),
                (Models, r.model_id.clone()),
            ],
            Resource::SerializedModel(r) => vec![
                (Projects, r.project_id.clone()),
                (Brains, r.brain_id.clone()),
                (Sessions, r.session_id.clone()),
                (SerializedModels, r.model_id.clone()),
            ],
            Resource::OfflineEvaluation(r) => vec![
                (Projects, r.project_id.clone()),
                (Brains, r.brain_id.clone()),
                (Sessions, r.session_id.clone()),
                (Models, r.model_id.clone()),
                (OfflineEvaluations, r.offline_evaluation_id.to_string()),
            ],
        };

        ResourceId::new(parts)
    }

    /// Creation timestamp carried by the record, if set.
    pub fn timestamp_micros(&self, resource: &Resource) -> Option<i64> {
        *created_micros(resource)
    }

    /// Set the record's creation timestamp (in memory only).
    pub fn set_timestamp_micros(&self, resource: &mut Resource, timestamp_micros: i64) {
        *created_micros_mut(resource) = Some(timestamp_micros);
    }
}

/// Path segment for an assignment id: lowercase hex SHA-256.
pub fn hash_assignment_id(assignment_id: &str) -> String {
    hex::encode(Sha256::digest(assignment_id.as_bytes()))
}

fn created_micros(resource: &Resource) -> &Option<i64> {
    match resource {
        Resource::Project(r) => &r.created_micros,
        Resource::Brain(r) => &r.created_micros,
        Resource::Snapshot(r) => &r.created_micros,
        Resource::Session(r) => &r.created_micros,
        Resource::EpisodeChunk(r) => &r.created_micros,
        Resource::OnlineEvaluation(r) => &r.created_micros,
        Resource::Assignment(r) => &r.created_micros,
        Resource::Model(r) => &r.created_micros,
        Resource::SerializedModel(r) => &r.created_micros,
        Resource::OfflineEvaluation(r) => &r.created_micros,
    }
}

fn created_micros_mut(resource: &mut Resource) -> &mut Option<i64> {
    match resource {
        Resource::Project(r) => &mut r.created_micros,
        Resource::Brain(r) => &mut r.created_micros,
        Resource::Snapshot(r) => &mut r.created_micros,
        Resource::Session(r) => &mut r.created_micros,
        Resource::EpisodeChunk(r) => &mut r.created_micros,
        Resource::OnlineEvaluation(r) => &mut r.created_micros,
        Resource::Assignment(r) => &mut r.created_micros,
        Resource::Model(r) => &mut r.created_micros,
        Resource::SerializedModel(r) => &mut r.created_micros,
        Resource::OfflineEvaluation(r) => &mut r.created_micros,
    }
}

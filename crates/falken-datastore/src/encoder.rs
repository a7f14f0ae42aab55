//! Encodes records to bytes and back, keyed by resource id.
//!
//! The id's own collection decides which record type the bytes hold, so the
//! payload itself carries no type tag.

use bytes::Bytes;
use serde::Serialize;

use crate::error::{DataStoreError, DataStoreResult};
use crate::resource_id::{Collection, ResourceId};
use crate::resources::{
    Assignment, Brain, EpisodeChunk, Model, OfflineEvaluation, OnlineEvaluation, Project,
    Record, Resource, SerializedModel, Session, Snapshot,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceEncoder;

impl ResourceEncoder {
    /// Typecheck `resource` against `id` and serialize it.
    pub fn encode(&self, id: &ResourceId, resource: &Resource) -> DataStoreResult<Bytes> {
        let expected = expected_collection(id)?;
        if resource.collection() != expected {
            return Err(DataStoreError::TypeMismatch {
                resource_id: Some(id.to_string()),
                expected,
                actual: resource.collection(),
            });
        }

        match resource {
            Resource::Project(r) => to_bytes(id, r),
            Resource::Brain(r) => to_bytes(id, r),
            Resource::Snapshot(r) => to_bytes(id, r),
            Resource::Session(r) => to_bytes(id, r),
            Resource::EpisodeChunk(r) => to_bytes(id, r),
            Resource::OnlineEvaluation(r) => to_bytes(id, r),
            Resource::Assignment(r) => to_bytes(id, r),
            Resource::Model(r) => to_bytes(id, r),
            Resource::SerializedModel(r) => to_bytes(id, r),
            Resource::OfflineEvaluation(r) => to_bytes(id, r),
        }
    }

    /// Deserialize bytes stored under `id`.
    pub fn decode(&self, id: &ResourceId, data: &[u8]) -> DataStoreResult<Resource> {
        match id.collection() {
            Collection::Projects => from_bytes::<Project>(id, data),
            Collection::Brains => from_bytes::<Brain>(id, data),
            Collection::Snapshots => from_bytes::<Snapshot>(id, data),
            Collection::Sessions => from_bytes::<Session>(id, data),
            Collection::Chunks => from_bytes::<EpisodeChunk>(id, data),
            Collection::OnlineEvaluations => from_bytes::<OnlineEvaluation>(id, data),
            Collection::Assignments => from_bytes::<Assignment>(id, data),
            Collection::Models => from_bytes::<Model>(id, data),
            Collection::SerializedModels => from_bytes::<SerializedModel>(id, data),
            Collection::OfflineEvaluations => from_bytes::<OfflineEvaluation>(id, data),
            Collection::Episodes => Err(unsupported(Collection::Episodes)),
        }
    }
}

/// Record collection addressed by `id`; episodes are directories only.
fn expected_collection(id: &ResourceId) -> DataStoreResult<Collection> {
    match id.collection() {
        Collection::Episodes => Err(unsupported(Collection::Episodes)),
        collection => Ok(collection),
    }
}

fn unsupported(collection: Collection) -> DataStoreError {
    DataStoreError::UnsupportedCollection {
        collection: collection.to_string(),
    }
}

fn from_bytes<T: Record>(id: &ResourceId, data: &[u8]) -> DataStoreResult<Resource> {
    serde_json::from_slice::<T>(data)
        .map(Into::into)
        .map_err(|e| DataStoreError::Decode {
            resource_id: id.to_string(),
            message: e.to_string(),
        })
}

fn to_bytes<T: Serialize>(id: &ResourceId, record: &T) -> DataStoreResult<Bytes> {
    serde_json::to_vec(record)
        .map(Bytes::from)
        .map_err(|e| DataStoreError::Encode {
            resource_id: id.to_string(),
            message: e.to_string(),
        })
}

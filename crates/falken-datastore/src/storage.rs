//! Session bookkeeping for the learner.
//!
//! Thin helpers over [`DataStore`] that read and update sessions,
//! assignments, models and evaluations the way the training loop needs.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DataStoreConfig;
use crate::data_store::DataStore;
use crate::error::{DataStoreError, DataStoreResult};
use crate::resource_id::ResourceId;
use crate::resource_store::ListOptions;
use crate::resources::{
    Assignment, EpisodeChunk, LatencyStats, Model, OfflineEvaluation, Status, StatusCode,
};

/// Activity state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No data submitted yet.
    New,
    /// Data submitted recently.
    InProgress,
    /// No recent data submitted.
    Stale,
    /// Session marked as ended.
    Ended,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::New => "NEW",
            SessionState::InProgress => "IN_PROGRESS",
            SessionState::Stale => "STALE",
            SessionState::Ended => "ENDED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly trained model to record.
#[derive(Debug, Clone, Default)]
pub struct NewModel {
    /// Generated when `None`.
    pub model_id: Option<String>,
    pub model_path: String,
    pub compressed_model_path: String,
    /// Episode holding the newest data the model was trained on.
    pub episode_id: String,
    pub episode_chunk_id: i64,
    pub training_examples_completed: i64,
    pub max_training_examples: i64,
    pub most_recent_demo_time_micros: i64,
    pub latency_stats: Option<LatencyStats>,
}

/// Learner-facing access to the data store.
#[derive(Clone)]
pub struct Storage {
    data_store: Arc<DataStore>,
    stale_after: Duration,
}

impl Storage {
    pub fn new(data_store: Arc<DataStore>) -> Self {
        Self {
            data_store,
            stale_after: DataStoreConfig::default().session_stale_after(),
        }
    }

    pub fn from_config(config: &DataStoreConfig) -> DataStoreResult<Self> {
        let data_store = DataStore::from_config(config)?;
        Ok(Self::new(Arc::new(data_store)).with_stale_after(config.session_stale_after()))
    }

    /// Set how long a session may go without data before it is stale.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn data_store(&self) -> &Arc<DataStore> {
        &self.data_store
    }

    /// Mark the session of `assignment` as failed with `error`.
    pub async fn record_session_error(
        &self,
        assignment: &Assignment,
        error: &dyn fmt::Display,
    ) -> DataStoreResult<()> {
        let mut session = self
            .data_store
            .read_session(
                &assignment.project_id,
                &assignment.brain_id,
                &assignment.session_id,
            )
            .await?;

        session.status = Some(unknown_status(error));
        self.data_store.write_record(&mut session).await?;
        Ok(())
    }

    /// Mark `assignment` as failed with `error`.
    pub async fn record_assignment_error(
        &self,
        assignment: &mut Assignment,
        error: &dyn fmt::Display,
    ) -> DataStoreResult<()> {
        assignment.status = Some(unknown_status(error));
        self.data_store.write_record(assignment).await?;
        Ok(())
    }

    /// Record offline evaluation scores of a model.
    ///
    /// `version_evals` pairs an evaluation set version with the score the
    /// model reached on it. All records share one creation timestamp.
    pub async fn record_evaluations(
        &self,
        assignment: &Assignment,
        model_id: &str,
        version_evals: &[(i64, f64)],
        latency_stats: Option<&LatencyStats>,
    ) -> DataStoreResult<Vec<ResourceId>> {
        let timestamp_micros = Utc::now().timestamp_micros();

        let mut ids = Vec::with_capacity(version_evals.len());
        for (version, score) in version_evals {
            let mut evaluation = OfflineEvaluation {
                project_id: assignment.project_id.clone(),
                brain_id: assignment.brain_id.clone(),
                session_id: assignment.session_id.clone(),
                model_id: model_id.to_string(),
                offline_evaluation_id: *version,
                score: *score,
                latency_stats: latency_stats.cloned(),
                created_micros: Some(timestamp_micros),
            };
            ids.push(self.data_store.write_record(&mut evaluation).await?);
        }
        Ok(ids)
    }

    /// Record a model trained for `assignment` and return its id.
    ///
    /// Nothing is written once the session has ended, but the id is still
    /// returned.
    pub async fn record_new_model(
        &self,
        assignment: &Assignment,
        new_model: NewModel,
    ) -> DataStoreResult<String> {
        if new_model.model_path.is_empty() {
            return Err(DataStoreError::InvalidArgument {
                message: "model path must not be empty".to_string(),
            });
        }

        let model_id = new_model
            .model_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut model = Model {
            project_id: assignment.project_id.clone(),
            brain_id: assignment.brain_id.clone(),
            session_id: assignment.session_id.clone(),
            model_id: model_id.clone(),
            model_path: new_model.model_path,
            compressed_model_path: new_model.compressed_model_path,
            assignment_id: assignment.assignment_id.clone(),
            episode_id: new_model.episode_id,
            episode_chunk_id: new_model.episode_chunk_id,
            training_examples_completed: new_model.training_examples_completed,
            max_training_examples: new_model.max_training_examples,
            most_recent_demo_time_micros: new_model.most_recent_demo_time_micros,
            latency_stats: new_model.latency_stats,
            created_micros: None,
        };

        tracing::info!(
            project_id = %assignment.project_id,
            brain_id = %assignment.brain_id,
            session_id = %assignment.session_id,
            model_id = %model_id,
            model_path = %model.model_path,
            episode_id = %model.episode_id,
            episode_chunk_id = model.episode_chunk_id,
            "recording new model"
        );

        let state = self
            .get_session_state(
                &assignment.project_id,
                &assignment.brain_id,
                &assignment.session_id,
                None,
            )
            .await?;

        if state == SessionState::Ended {
            tracing::info!(
                session_id = %assignment.session_id,
                model_id = %model_id,
                "skipping model write for ended session"
            );
        } else {
            self.data_store.write_record(&mut model).await?;
        }
        Ok(model_id)
    }

    /// Observation/action spec of a brain.
    pub async fn get_brain_spec(
        &self,
        project_id: &str,
        brain_id: &str,
    ) -> DataStoreResult<serde_json::Value> {
        Ok(self
            .data_store
            .read_brain(project_id, brain_id)
            .await?
            .brain_spec)
    }

    /// Classify a session as of `as_of` (default: now).
    pub async fn get_session_state(
        &self,
        project_id: &str,
        brain_id: &str,
        session_id: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> DataStoreResult<SessionState> {
        let session = self
            .data_store
            .read_session(project_id, brain_id, session_id)
            .await?;

        if let Some(ended_micros) = session.ended_micros {
            tracing::info!(session_id, ended_micros, "session ended");
            return Ok(SessionState::Ended);
        }

        let last_activity_micros = session
            .last_data_received_micros
            .or(session.created_micros)
            .unwrap_or_default();
        let now_micros = as_of.unwrap_or_else(Utc::now).timestamp_micros();
        let stale_micros = i64::try_from(self.stale_after.as_micros()).unwrap_or(i64::MAX);

        if now_micros.saturating_sub(last_activity_micros) > stale_micros {
            tracing::warn!(session_id, last_activity_micros, "session is stale");
            return Ok(SessionState::Stale);
        }

        if session.last_data_received_micros.is_some() {
            return Ok(SessionState::InProgress);
        }
        Ok(SessionState::New)
    }

    pub async fn get_assignment(
        &self,
        project_id: &str,
        brain_id: &str,
        session_id: &str,
        assignment_id: &str,
    ) -> DataStoreResult<Assignment> {
        self.data_store
            .read_assignment(project_id, brain_id, session_id, assignment_id)
            .await
    }

    /// Sessions that produced any snapshot this session descends from.
    pub async fn get_ancestor_session_ids(
        &self,
        project_id: &str,
        brain_id: &str,
        session_id: &str,
    ) -> DataStoreResult<BTreeSet<String>> {
        let session = self
            .data_store
            .read_session(project_id, brain_id, session_id)
            .await?;

        let mut ancestor_snapshot_ids: BTreeSet<String> =
            session.starting_snapshot_ids.iter().cloned().collect();
        for snapshot_id in &session.starting_snapshot_ids {
            let snapshot = self
                .data_store
                .read_snapshot(project_id, brain_id, snapshot_id)
                .await?;
            for parents in snapshot.ancestor_snapshot_ids {
                ancestor_snapshot_ids.insert(parents.snapshot_id);
                ancestor_snapshot_ids.extend(parents.parent_snapshot_ids);
            }
        }

        let mut session_ids = BTreeSet::new();
        for snapshot_id in &ancestor_snapshot_ids {
            let snapshot = self
                .data_store
                .read_snapshot(project_id, brain_id, snapshot_id)
                .await?;
            session_ids.insert(snapshot.session_id);
        }
        Ok(session_ids)
    }

    /// Every episode chunk of the given sessions created at or after
    /// `min_timestamp_micros`, oldest first.
    pub async fn get_episode_chunks<S: AsRef<str>>(
        &self,
        project_id: &str,
        brain_id: &str,
        session_ids: &[S],
        min_timestamp_micros: Option<i64>,
    ) -> DataStoreResult<Vec<EpisodeChunk>> {
        let session_glob = match session_ids {
            [] => {
                return Err(DataStoreError::InvalidArgument {
                    message: "at least one session id is required".to_string(),
                })
            }
            [session_id] => session_id.as_ref().to_string(),
            _ => format!(
                "{{{}}}",
                session_ids
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        };

        let id_glob = ResourceId::builder()
            .project(project_id)
            .brain(brain_id)
            .session(session_glob)
            .episode("*")
            .chunk("*")
            .build()?;
        let options =
            ListOptions::new().with_min_timestamp_micros(min_timestamp_micros.unwrap_or_default());
        let page = self.data_store.list(&id_glob, &options).await?;

        let mut chunks: Vec<EpisodeChunk> = Vec::with_capacity(page.resource_ids.len());
        for id in &page.resource_ids {
            let id: ResourceId = id.parse()?;
            chunks.push(self.data_store.read_as(&id).await?);
        }
        Ok(chunks)
    }
}

fn unknown_status(error: &dyn fmt::Display) -> Status {
    Status {
        code: StatusCode::Unknown,
        message: error.to_string(),
    }
}

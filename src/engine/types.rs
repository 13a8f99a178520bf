//! Engine types
//!
//! Entity states, per-entity outcomes and the run summary.

use crate::config::PipelineConfig;
use crate::error::{Error, ErrorKind};
use crate::types::Entity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Options for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Entities to process, in run order
    pub entities: Vec<Entity>,
    /// Upper bound on requests per fetch, first attempt included
    pub max_attempts: u32,
    /// Entities processed concurrently
    pub workers: usize,
    /// `limit` query parameter for list endpoints that accept it
    pub limit: Option<u32>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            entities: Entity::ALL.to_vec(),
            max_attempts: 3,
            workers: 1,
            limit: None,
        }
    }
}

impl PipelineOptions {
    /// Create options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Take attempt budget, workers and limit from a config
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            entities: Entity::ALL.to_vec(),
            max_attempts: config.max_attempts,
            workers: config.workers,
            limit: config.limit,
        }
    }

    /// Restrict the run to some entities
    #[must_use]
    pub fn with_entities(mut self, entities: Vec<Entity>) -> Self {
        self.entities = entities;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Query parameters for the list request of `entity`
    pub fn list_query(&self, entity: Entity) -> Vec<(String, String)> {
        match self.limit {
            Some(limit) if entity.supports_limit() => vec![("limit".to_string(), limit.to_string())],
            _ => Vec::new(),
        }
    }
}

/// Where an entity is in its pipeline
///
/// `Pending → Fetching → Normalizing → Writing → Done`, or `Failed` from
/// any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Pending,
    Fetching,
    Normalizing,
    Writing,
    Done,
    Failed,
}

impl EntityState {
    /// Whether no further transition can happen
    pub fn is_terminal(self) -> bool {
        matches!(self, EntityState::Done | EntityState::Failed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: EntityState) -> bool {
        use EntityState::{Done, Failed, Fetching, Normalizing, Pending, Writing};
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Normalizing)
                | (Normalizing, Writing)
                | (Writing, Done)
                | (Pending | Fetching | Normalizing | Writing, Failed)
        )
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityState::Pending => "pending",
            EntityState::Fetching => "fetching",
            EntityState::Normalizing => "normalizing",
            EntityState::Writing => "writing",
            EntityState::Done => "done",
            EntityState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final result of one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    /// Snapshot written
    Done { rows: usize, path: PathBuf },
    /// Stopped in `stage` because of an error
    Failed {
        stage: EntityState,
        kind: ErrorKind,
        cause: String,
    },
}

/// Outcome of one entity plus bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityOutcome {
    pub entity: Entity,
    pub table: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Requests made, retries included
    pub fetch_attempts: u32,
    pub duration_ms: u64,
}

impl EntityOutcome {
    /// Final state: `Done` or `Failed`
    pub fn state(&self) -> EntityState {
        match self.outcome {
            Outcome::Done { .. } => EntityState::Done,
            Outcome::Failed { .. } => EntityState::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, Outcome::Done { .. })
    }

    pub fn rows(&self) -> Option<usize> {
        match self.outcome {
            Outcome::Done { rows, .. } => Some(rows),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            Outcome::Done { path, .. } => Some(path),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn cause(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { cause, .. } => Some(cause),
            Outcome::Done { .. } => None,
        }
    }
}

impl Outcome {
    /// Failure in `stage` caused by `error`
    pub fn failed(stage: EntityState, error: &Error) -> Self {
        Outcome::Failed {
            stage,
            kind: error.kind(),
            cause: error.to_string(),
        }
    }
}

/// What a run did, entity by entity
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub entities: Vec<EntityOutcome>,
}

impl RunSummary {
    /// True when every entity reached `Done`
    pub fn is_success(&self) -> bool {
        self.entities.iter().all(EntityOutcome::is_done)
    }

    /// Process exit status: 0 if all entities are done, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }

    pub fn done(&self) -> impl Iterator<Item = &EntityOutcome> {
        self.entities.iter().filter(|o| o.is_done())
    }

    pub fn failed(&self) -> impl Iterator<Item = &EntityOutcome> {
        self.entities.iter().filter(|o| !o.is_done())
    }

    /// Outcome for one entity, if it was part of the run
    pub fn get(&self, entity: Entity) -> Option<&EntityOutcome> {
        self.entities.iter().find(|o| o.entity == entity)
    }

    /// Rows written across all successful entities
    pub fn total_rows(&self) -> usize {
        self.done().filter_map(EntityOutcome::rows).sum()
    }
}

//! Execution engine module
//!
//! Drives each selected entity through fetch, normalize and write.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Pipeline` - Runs entities and collects a `RunSummary`
//! - `PipelineOptions` - Entity selection, attempt budget, workers, limit
//! - `RetryingFetcher` - Bounded retries around any `Fetcher`
//!
//! A failure stops only the entity that raised it. The other entities still
//! run, and the summary reports which stage each failed entity stopped in.

mod retry;
mod types;

pub use retry::RetryingFetcher;
pub use types::{EntityOutcome, EntityState, Outcome, PipelineOptions, RunSummary};

use crate::error::Result;
use crate::http::Fetcher;
use crate::normalize::normalize_entity;
use crate::output::SnapshotWriter;
use crate::types::Entity;
use chrono::{DateTime, SubsecRound, Utc};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};

/// Catalog pipeline over one fetcher and one snapshot writer
pub struct Pipeline<F: Fetcher> {
    fetcher: F,
    writer: SnapshotWriter,
    options: PipelineOptions,
}

impl<F: Fetcher> Pipeline<F> {
    /// Create a pipeline with default options
    pub fn new(fetcher: F, writer: SnapshotWriter) -> Self {
        Self {
            fetcher,
            writer,
            options: PipelineOptions::default(),
        }
    }

    /// Set run options
    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn writer(&self) -> &SnapshotWriter {
        &self.writer
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Run every selected entity and report what happened
    ///
    /// Never fails as a whole; per-entity failures are in the summary.
    /// Outcomes keep the order of `options.entities` whatever the worker
    /// count.
    pub async fn run(&self) -> RunSummary {
        // Snapshots store microseconds
        let started_at = Utc::now().trunc_subsecs(6);
        let start = Instant::now();
        let workers = self.options.workers.max(1);

        info!(
            entities = ?self.options.entities,
            workers,
            max_attempts = self.options.max_attempts,
            "Starting run"
        );

        let entities = if workers == 1 {
            let mut outcomes = Vec::with_capacity(self.options.entities.len());
            for &entity in &self.options.entities {
                outcomes.push(self.run_entity(entity, started_at).await);
            }
            outcomes
        } else {
            stream::iter(self.options.entities.iter().copied())
                .map(|entity| self.run_entity(entity, started_at))
                .buffered(workers)
                .collect::<Vec<_>>()
                .await
        };

        let summary = RunSummary {
            started_at,
            duration_ms: elapsed_ms(start),
            entities,
        };

        info!(
            done = summary.done().count(),
            failed = summary.failed().count(),
            rows = summary.total_rows(),
            duration_ms = summary.duration_ms,
            "Run finished"
        );
        summary
    }

    /// Run one entity to `Done` or `Failed`
    ///
    /// `extracted_at` is stamped on every row the entity produces and picks
    /// the `dt=` partition under the partitioned layout.
    pub async fn run_entity(&self, entity: Entity, extracted_at: DateTime<Utc>) -> EntityOutcome {
        let start = Instant::now();
        let fetcher = RetryingFetcher::new(&self.fetcher, self.options.max_attempts);
        let mut state = EntityState::Pending;

        let result = self
            .execute(entity, &fetcher, extracted_at, &mut state)
            .await;

        let outcome = match result {
            Ok((rows, path)) => Outcome::Done { rows, path },
            Err(e) => {
                error!(entity = %entity, stage = %state, error = %e, "Entity failed");
                Outcome::failed(state, &e)
            }
        };

        EntityOutcome {
            entity,
            table: entity.table_name().to_string(),
            outcome,
            fetch_attempts: fetcher.attempts(),
            duration_ms: elapsed_ms(start),
        }
    }

    async fn execute(
        &self,
        entity: Entity,
        fetcher: &dyn Fetcher,
        extracted_at: DateTime<Utc>,
        state: &mut EntityState,
    ) -> Result<(usize, PathBuf)> {
        advance(entity, state, EntityState::Fetching);
        let query = self.options.list_query(entity);
        let records = fetcher.fetch(entity.path(), &query).await?;
        debug!(entity = %entity, records = records.len(), "Fetched");

        advance(entity, state, EntityState::Normalizing);
        let table = normalize_entity(entity, records, fetcher, extracted_at).await?;

        advance(entity, state, EntityState::Writing);
        // Partitions are dated by the run, not by when the writer was built
        let writer = self.writer.clone().with_run_at(extracted_at);
        let path = writer.write(&table, entity.table_name())?;

        advance(entity, state, EntityState::Done);
        info!(
            entity = %entity,
            rows = table.num_rows(),
            path = %path.display(),
            "Entity done"
        );
        Ok((table.num_rows(), path))
    }
}

fn advance(entity: Entity, state: &mut EntityState, next: EntityState) {
    debug_assert!(state.can_transition_to(next), "{state} -> {next}");
    debug!(entity = %entity, from = %state, to = %next, "State change");
    *state = next;
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl<F: Fetcher> std::fmt::Debug for Pipeline<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("writer", &self.writer)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;

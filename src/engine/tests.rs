//! Tests for engine module

use super::*;
use crate::error::{Error, ErrorKind};
use crate::output::{arrow_to_json, read_snapshot};
use crate::types::{JsonValue, RawRecord};
use async_trait::async_trait;
use chrono::TimeZone;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::tempdir;
use test_case::test_case;

/// Canned payloads per path, with an optional number of failures to
/// serve before each path starts answering
#[derive(Default)]
struct ScriptedFetcher {
    payloads: HashMap<String, JsonValue>,
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl ScriptedFetcher {
    fn catalog() -> Self {
        Self::default()
            .with(
                "products",
                json!([
                    {"id": 1, "title": "Bag", "price": 109.95, "category": "men's clothing",
                     "rating": {"rate": 3.9, "count": 120}},
                    {"id": 2, "title": "Ring", "price": 9.99, "category": "jewelery",
                     "rating": {"rate": 4.1, "count": 70}}
                ]),
            )
            .with("products/categories", json!(["men's clothing", "jewelery"]))
            .with(
                "products/category/men's clothing",
                json!([{"id": 1, "price": 109.95}]),
            )
            .with(
                "products/category/jewelery",
                json!([{"id": 2, "price": 9.99}, {"id": 5, "price": 695}]),
            )
            .with(
                "users",
                json!([
                    {"id": 1, "email": "john@gmail.com",
                     "name": {"firstname": "john", "lastname": "doe"},
                     "address": {"city": "kilcoole", "geolocation": {"lat": "-37.3159", "long": "81.1496"}}}
                ]),
            )
            .with(
                "carts",
                json!([
                    {"id": 1, "userId": 1, "date": "2020-03-02T00:00:00.000Z",
                     "products": [{"productId": 1, "quantity": 4}, {"productId": 2, "quantity": 1}]},
                    {"id": 2, "userId": 1, "date": "2020-01-02T00:00:00.000Z",
                     "products": [{"productId": 2, "quantity": 4}]}
                ]),
            )
    }

    fn with(mut self, path: &str, payload: JsonValue) -> Self {
        self.payloads.insert(path.to_string(), payload);
        self
    }

    fn failing(self, path: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(path.to_string(), times);
        self
    }

    fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }

    fn query_for(&self, path: &str) -> Option<Vec<(String, String)>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, q)| q.clone())
    }

    fn answer(&self, path: &str, query: &[(String, String)]) -> Result<JsonValue> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_string(), query.to_vec()));

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::http_status(path, 503, "unavailable"));
            }
        }
        self.payloads
            .get(path)
            .cloned()
            .ok_or_else(|| Error::http_status(path, 404, "not found"))
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, path: &str, query: &[(String, String)]) -> Result<Vec<RawRecord>> {
        match self.answer(path, query)? {
            JsonValue::Array(items) => Ok(items),
            _ => Err(Error::fetch(
                path,
                crate::error::FetchCause::UnexpectedShape("not an array".into()),
            )),
        }
    }

    async fn fetch_one(&self, segments: &[&str]) -> Result<RawRecord> {
        self.answer(&segments.join("/"), &[])
    }
}

fn rows_of(path: &std::path::Path) -> Vec<JsonValue> {
    read_snapshot(path)
        .unwrap()
        .iter()
        .flat_map(arrow_to_json)
        .collect()
}

// ============================================================================
// State Tests
// ============================================================================

#[test_case(EntityState::Pending, EntityState::Fetching, true)]
#[test_case(EntityState::Fetching, EntityState::Normalizing, true)]
#[test_case(EntityState::Normalizing, EntityState::Writing, true)]
#[test_case(EntityState::Writing, EntityState::Done, true)]
#[test_case(EntityState::Fetching, EntityState::Failed, true)]
#[test_case(EntityState::Writing, EntityState::Failed, true)]
#[test_case(EntityState::Pending, EntityState::Writing, false)]
#[test_case(EntityState::Done, EntityState::Failed, false)]
#[test_case(EntityState::Failed, EntityState::Fetching, false)]
fn test_state_transitions(from: EntityState, to: EntityState, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn test_terminal_states() {
    assert!(EntityState::Done.is_terminal());
    assert!(EntityState::Failed.is_terminal());
    assert!(!EntityState::Writing.is_terminal());
}

#[test]
fn test_list_query_respects_limit_support() {
    let options = PipelineOptions::new().with_limit(Some(5));
    assert_eq!(
        options.list_query(Entity::Products),
        vec![("limit".to_string(), "5".to_string())]
    );
    assert!(options.list_query(Entity::Categories).is_empty());
    assert!(PipelineOptions::new().list_query(Entity::Users).is_empty());
}

#[test]
fn test_options_clamp_to_one() {
    let options = PipelineOptions::new().with_max_attempts(0).with_workers(0);
    assert_eq!(options.max_attempts, 1);
    assert_eq!(options.workers, 1);
}

// ============================================================================
// Retry Tests
// ============================================================================

#[tokio::test]
async fn test_retry_succeeds_within_budget() {
    let inner = ScriptedFetcher::catalog().failing("users", 2);
    let fetcher = RetryingFetcher::new(&inner, 3);

    let records = fetcher.fetch("users", &[]).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(fetcher.attempts(), 3);
    assert_eq!(inner.calls_to("users"), 3);
}

#[tokio::test]
async fn test_retry_gives_up_after_budget() {
    let inner = ScriptedFetcher::catalog().failing("users", 3);
    let fetcher = RetryingFetcher::new(&inner, 3);

    let err = fetcher.fetch("users", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
    assert_eq!(inner.calls_to("users"), 3);
}

#[tokio::test]
async fn test_single_attempt_budget_never_retries() {
    let inner = ScriptedFetcher::catalog().failing("carts", 1);
    let fetcher = RetryingFetcher::new(&inner, 1);

    assert!(fetcher.fetch("carts", &[]).await.is_err());
    assert_eq!(inner.calls_to("carts"), 1);
}

#[tokio::test]
async fn test_non_fetch_errors_are_not_retried() {
    struct SchemaFailing;

    #[async_trait]
    impl Fetcher for SchemaFailing {
        async fn fetch(&self, _: &str, _: &[(String, String)]) -> Result<Vec<RawRecord>> {
            Err(Error::schema("x", "broken"))
        }
        async fn fetch_one(&self, _: &[&str]) -> Result<RawRecord> {
            Err(Error::schema("x", "broken"))
        }
    }

    let fetcher = RetryingFetcher::new(&SchemaFailing, 5);
    assert!(fetcher.fetch_one(&["x"]).await.is_err());
    assert_eq!(fetcher.attempts(), 1);
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_full_run_writes_all_tables() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(ScriptedFetcher::catalog(), SnapshotWriter::new(dir.path()));

    let summary = pipeline.run().await;

    assert!(summary.is_success());
    assert_eq!(summary.exit_code(), 0);
    let order: Vec<Entity> = summary.entities.iter().map(|o| o.entity).collect();
    assert_eq!(order, Entity::ALL.to_vec());

    let rows: Vec<(String, Option<usize>)> = summary
        .entities
        .iter()
        .map(|o| (o.table.clone(), o.rows()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("products".to_string(), Some(2)),
            ("categories".to_string(), Some(2)),
            ("users".to_string(), Some(1)),
            ("cart_items".to_string(), Some(3)),
        ]
    );
    assert_eq!(summary.total_rows(), 8);

    for table in ["products", "categories", "users", "cart_items"] {
        assert!(dir.path().join(format!("{table}.parquet")).exists(), "{table}");
    }
}

#[tokio::test]
async fn test_categories_aggregated_through_pipeline() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(ScriptedFetcher::catalog(), SnapshotWriter::new(dir.path()))
        .with_options(PipelineOptions::new().with_entities(vec![Entity::Categories]));

    let summary = pipeline.run().await;
    let outcome = summary.get(Entity::Categories).unwrap();
    let rows = rows_of(outcome.path().unwrap());

    assert_eq!(rows[1]["category"], "jewelery");
    assert_eq!(rows[1]["product_count"], 2);
    assert_eq!(rows[1]["max_price"], 695.0);
    // list request plus one lookup per category
    assert_eq!(outcome.fetch_attempts, 3);
}

#[tokio::test]
async fn test_transient_failures_within_budget_still_succeed() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::catalog().failing("users", 2);
    let pipeline = Pipeline::new(fetcher, SnapshotWriter::new(dir.path())).with_options(
        PipelineOptions::new()
            .with_entities(vec![Entity::Users])
            .with_max_attempts(3),
    );

    let summary = pipeline.run().await;
    let outcome = summary.get(Entity::Users).unwrap();

    assert_eq!(outcome.state(), EntityState::Done);
    assert_eq!(outcome.fetch_attempts, 3);
    assert_eq!(pipeline.fetcher().calls_to("users"), 3);
}

#[tokio::test]
async fn test_exhausted_budget_fails_in_fetching() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::catalog().failing("users", 3);
    let pipeline = Pipeline::new(fetcher, SnapshotWriter::new(dir.path())).with_options(
        PipelineOptions::new()
            .with_entities(vec![Entity::Users])
            .with_max_attempts(3),
    );

    let summary = pipeline.run().await;
    let outcome = summary.get(Entity::Users).unwrap();

    match &outcome.outcome {
        Outcome::Failed { stage, kind, cause } => {
            assert_eq!(*stage, EntityState::Fetching);
            assert_eq!(*kind, ErrorKind::Fetch);
            assert!(cause.contains("503"), "{cause}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(pipeline.fetcher().calls_to("users"), 3);
    assert_eq!(summary.exit_code(), 1);
    assert!(!dir.path().join("users.parquet").exists());
}

#[tokio::test]
async fn test_category_lookup_is_retried() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::catalog().failing("products/category/jewelery", 1);
    let pipeline = Pipeline::new(fetcher, SnapshotWriter::new(dir.path()))
        .with_options(PipelineOptions::new().with_entities(vec![Entity::Categories]));

    let summary = pipeline.run().await;

    assert!(summary.is_success());
    assert_eq!(pipeline.fetcher().calls_to("products/category/jewelery"), 2);
}

#[tokio::test]
async fn test_schema_failure_is_isolated() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::catalog().with("users", json!([{"email": "no-id@example.com"}]));
    let pipeline = Pipeline::new(fetcher, SnapshotWriter::new(dir.path()));

    let summary = pipeline.run().await;

    let users = summary.get(Entity::Users).unwrap();
    match &users.outcome {
        Outcome::Failed { stage, kind, .. } => {
            assert_eq!(*stage, EntityState::Normalizing);
            assert_eq!(*kind, ErrorKind::Schema);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    // schema errors are not retried
    assert_eq!(users.fetch_attempts, 1);

    assert_eq!(summary.done().count(), 3);
    assert_eq!(summary.failed().count(), 1);
    assert_eq!(summary.exit_code(), 1);
    assert!(dir.path().join("products.parquet").exists());
    assert!(dir.path().join("cart_items.parquet").exists());
    assert!(!dir.path().join("users.parquet").exists());
}

#[tokio::test]
async fn test_write_failure_reported_in_writing_stage() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("out");
    std::fs::write(&blocker, b"file").unwrap();

    let pipeline = Pipeline::new(ScriptedFetcher::catalog(), SnapshotWriter::new(&blocker))
        .with_options(PipelineOptions::new().with_entities(vec![Entity::Products]));

    let summary = pipeline.run().await;
    let outcome = summary.get(Entity::Products).unwrap();

    match &outcome.outcome {
        Outcome::Failed { stage, kind, .. } => {
            assert_eq!(*stage, EntityState::Writing);
            assert_eq!(*kind, ErrorKind::Write);
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_limit_passed_to_list_endpoints() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(ScriptedFetcher::catalog(), SnapshotWriter::new(dir.path()))
        .with_options(PipelineOptions::new().with_limit(Some(1)));

    pipeline.run().await;

    let limit = vec![("limit".to_string(), "1".to_string())];
    assert_eq!(pipeline.fetcher().query_for("products"), Some(limit.clone()));
    assert_eq!(pipeline.fetcher().query_for("users"), Some(limit));
    assert_eq!(pipeline.fetcher().query_for("products/categories"), Some(vec![]));
}

#[tokio::test]
async fn test_entity_selection() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(ScriptedFetcher::catalog(), SnapshotWriter::new(dir.path()))
        .with_options(PipelineOptions::new().with_entities(vec![Entity::Products, Entity::Carts]));

    let summary = pipeline.run().await;

    assert_eq!(summary.entities.len(), 2);
    assert_eq!(pipeline.fetcher().calls_to("users"), 0);
    assert!(!dir.path().join("users.parquet").exists());
}

#[tokio::test]
async fn test_concurrent_workers_keep_entity_order() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::catalog().with("carts", json!({"not": "a list"}));
    let pipeline = Pipeline::new(fetcher, SnapshotWriter::new(dir.path()))
        .with_options(PipelineOptions::new().with_workers(4).with_max_attempts(1));

    let summary = pipeline.run().await;

    let states: Vec<(Entity, EntityState)> = summary
        .entities
        .iter()
        .map(|o| (o.entity, o.state()))
        .collect();
    assert_eq!(
        states,
        vec![
            (Entity::Products, EntityState::Done),
            (Entity::Categories, EntityState::Done),
            (Entity::Users, EntityState::Done),
            (Entity::Carts, EntityState::Failed),
        ]
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent_apart_from_extraction_time() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(ScriptedFetcher::catalog(), SnapshotWriter::new(dir.path()));

    let strip = |mut rows: Vec<JsonValue>| {
        for row in &mut rows {
            if let Some(obj) = row.as_object_mut() {
                obj.remove("extracted_at");
            }
        }
        rows
    };

    let first = pipeline.run().await;
    let before: Vec<_> = first
        .entities
        .iter()
        .map(|o| strip(rows_of(o.path().unwrap())))
        .collect();

    let second = pipeline.run().await;
    let after: Vec<_> = second
        .entities
        .iter()
        .map(|o| strip(rows_of(o.path().unwrap())))
        .collect();

    assert_eq!(before, after);
    assert_eq!(
        first.entities.iter().map(|o| o.path().cloned()).collect::<Vec<_>>(),
        second.entities.iter().map(|o| o.path().cloned()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_partition_date_follows_run_start() {
    let dir = tempdir().unwrap();
    let stale = Utc.with_ymd_and_hms(2001, 1, 1, 23, 59, 59).unwrap();
    let writer = SnapshotWriter::new(dir.path())
        .with_layout(crate::types::Layout::Partitioned)
        .with_run_at(stale);
    let pipeline = Pipeline::new(ScriptedFetcher::catalog(), writer)
        .with_options(PipelineOptions::new().with_entities(vec![Entity::Users]));

    let summary = pipeline.run().await;
    let path = summary.get(Entity::Users).unwrap().path().unwrap();

    let expected = dir
        .path()
        .join("users")
        .join(format!("dt={}", summary.started_at.format("%Y-%m-%d")))
        .join("data.parquet");
    assert_eq!(path, &expected);
    assert!(!dir.path().join("users").join("dt=2001-01-01").exists());
}

#[tokio::test]
async fn test_summary_serializes() {
    let dir = tempdir().unwrap();
    let fetcher = ScriptedFetcher::catalog().failing("carts", 1);
    let pipeline = Pipeline::new(fetcher, SnapshotWriter::new(dir.path())).with_options(
        PipelineOptions::new()
            .with_entities(vec![Entity::Products, Entity::Carts])
            .with_max_attempts(1),
    );

    let summary = pipeline.run().await;
    let value = serde_json::to_value(&summary).unwrap();

    assert_eq!(value["entities"][0]["entity"], "products");
    assert_eq!(value["entities"][0]["state"], "done");
    assert_eq!(value["entities"][0]["rows"], 2);
    assert_eq!(value["entities"][1]["table"], "cart_items");
    assert_eq!(value["entities"][1]["state"], "failed");
    assert_eq!(value["entities"][1]["stage"], "fetching");
    assert_eq!(value["entities"][1]["kind"], "fetch");
}

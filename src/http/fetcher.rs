//! The seam between the pipeline and the catalog source

use crate::error::Result;
use crate::types::RawRecord;
use async_trait::async_trait;

/// Read-only access to the catalog source
///
/// Implementations raise every failure immediately; deciding whether to
/// try again is the orchestrator's job.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a collection; the payload must be a JSON array
    async fn fetch(&self, path: &str, query: &[(String, String)]) -> Result<Vec<RawRecord>>;

    /// Fetch a single resource and return its payload unchanged
    ///
    /// Each entry of `segments` is one path segment, so a value containing
    /// `/` never splits into several.
    async fn fetch_one(&self, segments: &[&str]) -> Result<RawRecord>;
}

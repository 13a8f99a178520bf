//! Bounded retries around a [`Fetcher`]
//!
//! Every fetch an entity makes, the list request and any follow-up lookups,
//! goes through this wrapper. Only fetch errors are retried; spacing between
//! attempts comes from the wrapped fetcher's own request delay.

use crate::error::Result;
use crate::http::Fetcher;
use crate::types::RawRecord;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Fetcher that retries failed requests up to an attempt budget
pub struct RetryingFetcher<'a> {
    inner: &'a dyn Fetcher,
    max_attempts: u32,
    attempts: AtomicU32,
}

impl<'a> RetryingFetcher<'a> {
    /// Wrap `inner`, allowing `max_attempts` requests per fetch (at least 1)
    pub fn new(inner: &'a dyn Fetcher, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Requests made so far, across all fetches
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    async fn with_retry<'f, T: Send>(
        &self,
        path: &str,
        mut op: impl FnMut() -> BoxFuture<'f, Result<T>> + Send,
    ) -> Result<T> {
        let mut attempt = 1;
        loop {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            match op().await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        path,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl Fetcher for RetryingFetcher<'_> {
    async fn fetch(&self, path: &str, query: &[(String, String)]) -> Result<Vec<RawRecord>> {
        let inner = self.inner;
        self.with_retry(path, move || inner.fetch(path, query)).await
    }

    async fn fetch_one(&self, segments: &[&str]) -> Result<RawRecord> {
        let inner = self.inner;
        let path = segments.join("/");
        self.with_retry(&path, move || inner.fetch_one(segments)).await
    }
}

impl std::fmt::Debug for RetryingFetcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingFetcher")
            .field("max_attempts", &self.max_attempts)
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

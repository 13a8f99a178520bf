//! HTTP client for the catalog source
//!
//! Provides the one client the pipeline talks to the source through:
//! - Base URL joining with percent-encoded path segments
//! - Identifying User-Agent and default headers on every request
//! - Minimum spacing between requests
//! - Classification of every failure as a fetch error
//!
//! Retrying is left to the caller.

use super::fetcher::Fetcher;
use super::rate_limit::RateLimiter;
use crate::error::{Error, FetchCause, Result};
use crate::types::{JsonValue, RawRecord};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL all paths are joined to
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Minimum delay between two requests
    pub request_delay: Duration,
    /// Default headers for all requests
    pub default_headers: BTreeMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            request_delay: Duration::from_millis(500),
            default_headers: BTreeMap::new(),
            user_agent: format!("catalog-etl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the minimum delay between requests
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.config.request_delay = delay;
        self
    }

    /// Disable request spacing
    pub fn no_rate_limit(mut self) -> Self {
        self.config.request_delay = Duration::ZERO;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client with request spacing
pub struct HttpClient {
    client: Client,
    base_url: Url,
    config: HttpClientConfig,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::invalid_value(
                "base_url",
                format!("'{}' cannot be used as a base address", config.base_url),
            ));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.default_headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::invalid_value("headers", format!("{key}: {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| Error::invalid_value("headers", format!("{key}: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        let rate_limiter = RateLimiter::new(config.request_delay);

        Ok(Self {
            client,
            base_url,
            config,
            rate_limiter,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if request spacing is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_enabled()
    }

    /// Build the full URL for a path relative to the base URL
    ///
    /// `path` is split on `/` and each part percent-encoded on its own, so
    /// `products/category/men's clothing` stays three segments.
    pub fn build_url(&self, path: &str, query: &[(String, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// Build the full URL from literal path segments
    ///
    /// A segment is never split: `/` inside it is sent as `%2F` and `%` as
    /// `%25`. Empty, `.` and `..` segments would be dropped or resolved by
    /// URL normalization, so they are rejected.
    pub fn build_segment_url(&self, segments: &[&str]) -> Result<Url> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            let endpoint = format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                segments.join("/")
            );
            let cause = FetchCause::InvalidSegment((*bad).to_string());
            error!(endpoint = %endpoint, error = %cause, "Request not sent");
            return Err(Error::fetch(endpoint, cause));
        }

        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// GET a path and decode the body as JSON
    pub async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<JsonValue> {
        self.get_url(self.build_url(path, query)).await
    }

    async fn get_url(&self, url: Url) -> Result<JsonValue> {
        let endpoint = url.to_string();

        self.rate_limiter.wait().await;
        debug!(endpoint = %endpoint, "GET");

        let result = self.send(url).await;
        match result {
            Ok(value) => Ok(value),
            Err(cause) => {
                error!(endpoint = %endpoint, error = %cause, "Request failed");
                Err(Error::fetch(endpoint, cause))
            }
        }
    }

    async fn send(&self, url: Url) -> std::result::Result<JsonValue, FetchCause> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchCause::Status {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch(&self, path: &str, query: &[(String, String)]) -> Result<Vec<RawRecord>> {
        match self.get_json(path, query).await? {
            JsonValue::Array(records) => Ok(records),
            other => {
                let endpoint = self.build_url(path, query).to_string();
                let cause = FetchCause::UnexpectedShape(format!(
                    "expected a JSON array, got {}",
                    json_type_name(&other)
                ));
                error!(endpoint = %endpoint, error = %cause, "Request failed");
                Err(Error::fetch(endpoint, cause))
            }
        }
    }

    async fn fetch_one(&self, segments: &[&str]) -> Result<RawRecord> {
        let url = self.build_segment_url(segments)?;
        self.get_url(url).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

/// Name of a JSON value's type, for error messages
pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

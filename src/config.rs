//! Pipeline configuration
//!
//! A run is configured from an optional YAML file plus command-line
//! overrides. Every field has a default, so an empty file (or no file at
//! all) extracts the public FakeStore API into `./data`.
//!
//! ```yaml
//! base_url: https://fakestoreapi.com
//! output_dir: data
//! request_delay_ms: 500
//! max_attempts: 3
//! layout: partitioned
//! ```

use crate::error::{Error, Result};
use crate::http::HttpClientConfig;
use crate::types::{CompressionType, Layout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default source address
pub const DEFAULT_BASE_URL: &str = "https://fakestoreapi.com";

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Base address of the catalog API
    pub base_url: String,

    /// Directory receiving the snapshot files
    pub output_dir: PathBuf,

    /// Identifying User-Agent sent with every request
    pub user_agent: String,

    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Minimum delay between two requests in milliseconds
    pub request_delay_ms: u64,

    /// Attempts per fetch before an entity is marked failed
    pub max_attempts: u32,

    /// Entities processed concurrently
    pub workers: usize,

    /// Snapshot file layout
    pub layout: Layout,

    /// Parquet compression
    pub compression: CompressionType,

    /// Optional `limit` query parameter for list endpoints
    pub limit: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from("data"),
            user_agent: format!("catalog-etl/{}", env!("CARGO_PKG_VERSION")),
            headers: BTreeMap::new(),
            timeout_ms: 30_000,
            request_delay_ms: 500,
            max_attempts: 3,
            workers: 1,
            layout: Layout::Flat,
            compression: CompressionType::Snappy,
            limit: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a map
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check values that would only fail later, mid-run
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(Error::invalid_value(
                "base_url",
                format!("'{}' cannot be used as a base address", self.base_url),
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::invalid_value("max_attempts", "must be at least 1"));
        }
        if self.workers == 0 {
            return Err(Error::invalid_value("workers", "must be at least 1"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::invalid_value("user_agent", "must not be empty"));
        }
        Ok(())
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Minimum spacing between requests
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Build the fetcher configuration
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(&self.base_url)
            .timeout(self.timeout())
            .request_delay(self.request_delay())
            .user_agent(&self.user_agent);
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }
        builder.build()
    }
}

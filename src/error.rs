//! Error types for catalog-etl
//!
//! This module defines the error hierarchy for the whole pipeline.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Only three kinds of failure reach the orchestrator: fetch failures
//! (transient, retried), schema violations and write failures (both
//! terminal for the entity that raised them).

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for catalog-etl
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // ============================================================================
    // Fetch Errors
    // ============================================================================
    #[error("Request to {endpoint} failed: {cause}")]
    Fetch {
        endpoint: String,
        #[source]
        cause: FetchCause,
    },

    // ============================================================================
    // Schema Errors
    // ============================================================================
    #[error("Schema violation in '{table}': {message}")]
    Schema { table: String, message: String },

    // ============================================================================
    // Write Errors
    // ============================================================================
    #[error("Failed to write snapshot {}: {cause}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        cause: WriteCause,
    },

    #[error("Failed to read snapshot {}: {message}", .path.display())]
    ReadSnapshot { path: PathBuf, message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },
}

/// Underlying cause of a fetch failure
#[derive(Error, Debug)]
pub enum FetchCause {
    /// Connection refused, DNS failure, timeout, body read failure
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body is not valid JSON
    #[error("malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// Body is valid JSON but not the shape the endpoint promises
    #[error("unexpected payload: {0}")]
    UnexpectedShape(String),

    /// Path segment that no URL can carry as-is (empty, `.` or `..`)
    #[error("unaddressable path segment '{0}'")]
    InvalidSegment(String),
}

/// Underlying cause of a write failure
#[derive(Error, Debug)]
pub enum WriteCause {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Coarse classification used in run summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    Schema,
    Write,
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Fetch => "fetch",
            ErrorKind::Schema => "schema",
            ErrorKind::Write => "write",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a fetch error
    pub fn fetch(endpoint: impl Into<String>, cause: impl Into<FetchCause>) -> Self {
        Self::Fetch {
            endpoint: endpoint.into(),
            cause: cause.into(),
        }
    }

    /// Create an HTTP status fetch error
    pub fn http_status(endpoint: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Fetch {
            endpoint: endpoint.into(),
            cause: FetchCause::Status {
                status,
                body: body.into(),
            },
        }
    }

    /// Create a schema error
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a write error
    pub fn write(path: impl Into<PathBuf>, cause: impl Into<WriteCause>) -> Self {
        Self::Write {
            path: path.into(),
            cause: cause.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Fetch { .. } => ErrorKind::Fetch,
            Error::Schema { .. } => ErrorKind::Schema,
            Error::Write { .. }
            | Error::ReadSnapshot { .. }
            | Error::Io(_)
            | Error::FileNotFound { .. } => ErrorKind::Write,
            Error::Config { .. } | Error::InvalidConfigValue { .. } | Error::YamlParse(_) => {
                ErrorKind::Config
            }
        }
    }

    /// Check if this error is retryable
    ///
    /// Every fetch failure counts as transient except a request that could
    /// not be addressed at all; the attempt budget bounds how long a
    /// permanently broken endpoint is hammered.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch { cause, .. } => !matches!(cause, FetchCause::InvalidSegment(_)),
            _ => false,
        }
    }
}

/// Result type alias for catalog-etl
pub type Result<T> = std::result::Result<T, Error>;

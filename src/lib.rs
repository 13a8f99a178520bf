// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Catalog ETL
//!
//! Extracts a store catalog (products, categories, users, carts) from a
//! REST API and writes one flat Parquet snapshot per table.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use catalog_etl::{HttpClient, Pipeline, PipelineConfig, PipelineOptions, SnapshotWriter};
//!
//! #[tokio::main]
//! async fn main() -> catalog_etl::Result<()> {
//!     let config = PipelineConfig::default();
//!     let client = HttpClient::with_config(config.http_client_config())?;
//!     let writer = SnapshotWriter::new(&config.output_dir);
//!
//!     let summary = Pipeline::new(client, writer)
//!         .with_options(PipelineOptions::from_config(&config))
//!         .run()
//!         .await;
//!
//!     std::process::exit(summary.exit_code());
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Pipeline                            │
//! │   per entity: Pending → Fetching → Normalizing → Writing     │
//! │               → Done | Failed(stage)                         │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//! ┌───────────────────┬──────────┴─────────────┬─────────────────┐
//! │      Fetcher      │       Normalizer       │      Writer     │
//! ├───────────────────┼────────────────────────┼─────────────────┤
//! │ GET + JSON decode │ flatten (2/3 levels)   │ Arrow batch     │
//! │ Request spacing   │ explode cart lines     │ Parquet file    │
//! │ Bounded retries   │ category price stats   │ atomic replace  │
//! └───────────────────┴────────────────────────┴─────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Pipeline configuration
pub mod config;

/// HTTP fetcher with request spacing
pub mod http;

/// Record validation, flattening and aggregation
pub mod normalize;

/// Arrow/Parquet output
pub mod output;

/// Pipeline orchestration
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use engine::{EntityOutcome, EntityState, Pipeline, PipelineOptions, RunSummary};
pub use http::{Fetcher, HttpClient, HttpClientConfig};
pub use normalize::Table;
pub use output::SnapshotWriter;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

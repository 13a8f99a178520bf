//! Output module
//!
//! Handles Arrow RecordBatch creation and Parquet snapshot writing.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Converting normalized tables to Arrow RecordBatches
//! - Writing one Parquet snapshot per table, atomically
//! - Choosing deterministic snapshot destinations
//! - Reading snapshots back as JSON records

mod layout;
mod schema;
mod writer;

pub use layout::{build_partitioned_dir, latest_snapshot, snapshot_path, SNAPSHOT_EXTENSION};
pub use schema::{arrow_to_json, arrow_type, table_schema, table_to_arrow};
pub use writer::{read_snapshot, ParquetWriterConfig, SnapshotWriter};

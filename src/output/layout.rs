//! Snapshot destinations

use crate::types::Layout;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// File extension of snapshot files
pub const SNAPSHOT_EXTENSION: &str = "parquet";

/// Sanitize a table name for use as a path component
fn sanitize(table: &str) -> String {
    table.replace(['.', '/', '\\'], "_")
}

/// Build a Hive-style partitioned directory path
///
/// Format: `{base_path}/{table}/dt={YYYY-MM-DD}`
pub fn build_partitioned_dir(base_path: &Path, table: &str, run_at: DateTime<Utc>) -> PathBuf {
    let date = run_at.format("%Y-%m-%d");
    base_path
        .join(sanitize(table))
        .join(format!("dt={date}"))
}

/// Destination of a table's snapshot
///
/// - `Flat`: `{base}/{table}.parquet`
/// - `Partitioned`: `{base}/{table}/dt={YYYY-MM-DD}/data.parquet`
pub fn snapshot_path(base_path: &Path, table: &str, layout: Layout, run_at: DateTime<Utc>) -> PathBuf {
    match layout {
        Layout::Flat => base_path.join(format!("{}.{SNAPSHOT_EXTENSION}", sanitize(table))),
        Layout::Partitioned => build_partitioned_dir(base_path, table, run_at)
            .join(format!("data.{SNAPSHOT_EXTENSION}")),
    }
}

/// Most recent snapshot of a table, if one exists
///
/// For the partitioned layout this is the newest `dt=` partition that holds
/// a data file.
pub fn latest_snapshot(base_path: &Path, table: &str, layout: Layout) -> Option<PathBuf> {
    match layout {
        Layout::Flat => {
            let path = base_path.join(format!("{}.{SNAPSHOT_EXTENSION}", sanitize(table)));
            path.is_file().then_some(path)
        }
        Layout::Partitioned => {
            let entries = std::fs::read_dir(base_path.join(sanitize(table))).ok()?;
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().starts_with("dt="))
                .map(|entry| entry.path().join(format!("data.{SNAPSHOT_EXTENSION}")))
                .filter(|path| path.is_file())
                .max()
        }
    }
}

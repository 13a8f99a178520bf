//! Parquet snapshot writer
//!
//! Each call writes one complete table. The file is built under a
//! temporary name next to its destination and renamed into place once it
//! is closed and synced, so readers only ever see whole snapshots.

use super::layout::snapshot_path;
use super::schema::table_to_arrow;
use crate::error::{Error, Result};
use crate::normalize::Table;
use crate::types::{CompressionType, Layout};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration for Parquet encoding
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024, // 1M rows
        }
    }
}

impl ParquetWriterConfig {
    /// Create a new config with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set compression algorithm
    #[must_use]
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = match compression {
            CompressionType::None => Compression::UNCOMPRESSED,
            CompressionType::Snappy => Compression::SNAPPY,
            CompressionType::Zstd => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
            CompressionType::Gzip => Compression::GZIP(parquet::basic::GzipLevel::default()),
        };
        self
    }

    /// Set row group size
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Get row group size
    #[must_use]
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    /// Build writer properties
    fn build_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

/// Writes table snapshots below one output directory
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    output_dir: PathBuf,
    layout: Layout,
    config: ParquetWriterConfig,
    run_at: DateTime<Utc>,
}

impl SnapshotWriter {
    /// Create a writer using the flat layout and default encoding
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            layout: Layout::Flat,
            config: ParquetWriterConfig::default(),
            run_at: Utc::now(),
        }
    }

    /// Set the file layout
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the Parquet encoding
    #[must_use]
    pub fn with_config(mut self, config: ParquetWriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the run time used for partitioned paths
    #[must_use]
    pub fn with_run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = run_at;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Where `table_name` is written
    pub fn destination(&self, table_name: &str) -> PathBuf {
        snapshot_path(&self.output_dir, table_name, self.layout, self.run_at)
    }

    /// Write a table as one Parquet file, replacing the previous snapshot
    ///
    /// Returns the path written.
    pub fn write(&self, table: &Table, table_name: &str) -> Result<PathBuf> {
        let path = self.destination(table_name);
        let dir = path.parent().unwrap_or(&self.output_dir).to_path_buf();

        fs::create_dir_all(&dir).map_err(|e| Error::write(path.clone(), e))?;
        let batch = table_to_arrow(table).map_err(|e| Error::write(path.clone(), e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{table_name}."))
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| Error::write(path.clone(), e))?;
        debug!(tmp = %tmp.path().display(), "Writing snapshot to temp file");

        let mut writer = ArrowWriter::try_new(
            tmp.as_file_mut(),
            batch.schema(),
            Some(self.config.build_properties()),
        )
        .map_err(|e| Error::write(path.clone(), e))?;
        writer
            .write(&batch)
            .map_err(|e| Error::write(path.clone(), e))?;
        writer.close().map_err(|e| Error::write(path.clone(), e))?;

        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::write(path.clone(), e))?;
        // Dropping `tmp` on any earlier error removes the partial file
        tmp.persist(&path)
            .map_err(|e| Error::write(path.clone(), e.error))?;

        info!(
            table = table_name,
            rows = batch.num_rows(),
            path = %path.display(),
            "Wrote snapshot"
        );
        Ok(path)
    }
}

/// Read a snapshot file back into RecordBatches
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<Vec<RecordBatch>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let read_err = |message: String| Error::ReadSnapshot {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .map_err(|e| read_err(e.to_string()))?;

    reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| read_err(e.to_string()))
}

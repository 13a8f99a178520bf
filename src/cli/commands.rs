//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Catalog ETL: extract the store catalog into Parquet snapshots
#[derive(Parser, Debug)]
#[command(name = "catalog-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Base address of the catalog API
    #[arg(long, global = true, env = "CATALOG_ETL_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory receiving the snapshots
    #[arg(short, long, global = true, env = "CATALOG_ETL_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract, normalize and write the selected entities
    Run {
        /// Entities to run (comma-separated; omitted or empty = all)
        #[arg(long)]
        entities: Option<String>,

        /// `limit` query parameter for list endpoints
        #[arg(long)]
        limit: Option<u32>,

        /// Entities processed concurrently
        #[arg(long)]
        workers: Option<usize>,

        /// Write into `{table}/dt=YYYY-MM-DD/` directories
        #[arg(long)]
        partitioned: bool,
    },

    /// Print the rows of a table's latest snapshot
    Inspect {
        /// Table name (products, categories, users, cart_items)
        table: String,

        /// Maximum rows to print
        #[arg(long, default_value = "20")]
        max_rows: usize,
    },

    /// Print the effective configuration
    Config,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one value per line)
    Json,
    /// Human-readable output
    Pretty,
}

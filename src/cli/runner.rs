//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::PipelineConfig;
use crate::engine::{Pipeline, PipelineOptions, RunSummary};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::output::{arrow_to_json, latest_snapshot, read_snapshot, ParquetWriterConfig, SnapshotWriter};
use crate::types::{parse_entities, Entity, Layout};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command and return the process exit code
    pub async fn run(&self) -> Result<i32> {
        match &self.cli.command {
            Commands::Run { entities, .. } => {
                let summary = self.run_pipeline(entities.as_deref()).await?;
                Ok(summary.exit_code())
            }
            Commands::Inspect { table, max_rows } => self.inspect(table, *max_rows).map(|()| 0),
            Commands::Config => self.show_config().map(|()| 0),
        }
    }

    /// Effective configuration: file (or defaults), then flag and env overrides
    pub fn resolve_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.cli.config {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                PipelineConfig::load(path)?
            }
            None => PipelineConfig::default(),
        };

        if let Some(base_url) = &self.cli.base_url {
            config.base_url.clone_from(base_url);
        }
        if let Some(output_dir) = &self.cli.output_dir {
            config.output_dir.clone_from(output_dir);
        }

        if let Commands::Run {
            limit,
            workers,
            partitioned,
            ..
        } = &self.cli.command
        {
            if limit.is_some() {
                config.limit = *limit;
            }
            if let Some(workers) = workers {
                config.workers = *workers;
            }
            if *partitioned {
                config.layout = Layout::Partitioned;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Run the pipeline and print its summary
    async fn run_pipeline(&self, entities: Option<&str>) -> Result<RunSummary> {
        let config = self.resolve_config()?;
        let entities = selected_entities(entities)?;

        let client = HttpClient::with_config(config.http_client_config())?;
        let writer = SnapshotWriter::new(&config.output_dir)
            .with_layout(config.layout)
            .with_config(ParquetWriterConfig::new().with_compression(config.compression));
        let options = PipelineOptions::from_config(&config).with_entities(entities);

        info!(
            base_url = %config.base_url,
            output_dir = %config.output_dir.display(),
            "Running pipeline"
        );
        let summary = Pipeline::new(client, writer)
            .with_options(options)
            .run()
            .await;

        self.output(&summary)?;
        Ok(summary)
    }

    /// Print rows of a table's latest snapshot
    fn inspect(&self, table: &str, max_rows: usize) -> Result<()> {
        let config = self.resolve_config()?;
        let entity: Entity = table.parse()?;
        let table_name = entity.table_name();

        let other_layout = match config.layout {
            Layout::Flat => Layout::Partitioned,
            Layout::Partitioned => Layout::Flat,
        };
        let path = latest_snapshot(&config.output_dir, table_name, config.layout)
            .or_else(|| latest_snapshot(&config.output_dir, table_name, other_layout))
            .ok_or_else(|| Error::FileNotFound {
                path: format!("{} (no snapshot of '{table_name}')", config.output_dir.display()),
            })?;
        debug!(path = %path.display(), "Reading snapshot");

        let rows = read_snapshot(&path)?
            .iter()
            .flat_map(arrow_to_json)
            .take(max_rows)
            .collect::<Vec<_>>();
        for row in &rows {
            self.output(row)?;
        }
        Ok(())
    }

    /// Print the effective configuration as YAML
    fn show_config(&self) -> Result<()> {
        let config = self.resolve_config()?;
        let yaml = config.to_yaml()?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(yaml.as_bytes())?;
        Ok(())
    }

    /// Print one value in the selected format
    fn output<T: Serialize>(&self, value: &T) -> Result<()> {
        let text = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(value),
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
        }
        .map_err(|e| Error::config(format!("cannot render output: {e}")))?;

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{text}")?;
        Ok(())
    }
}

/// Entities named by `--entities`; omitted or blank selects all
fn selected_entities(list: Option<&str>) -> Result<Vec<Entity>> {
    match list.map(str::trim) {
        Some(list) if !list.is_empty() => parse_entities(list),
        _ => Ok(Entity::ALL.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn runner(args: &[&str]) -> Runner {
        let mut argv = vec!["catalog-etl"];
        argv.extend_from_slice(args);
        Runner::new(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("etl.yaml");
        std::fs::write(
            &file,
            "base_url: http://file.test\noutput_dir: from-file\nworkers: 2\nlimit: 7\n",
        )
        .unwrap();

        let config = runner(&[
            "--config",
            file.to_str().unwrap(),
            "--base-url",
            "http://flag.test",
            "run",
            "--workers",
            "3",
            "--partitioned",
        ])
        .resolve_config()
        .unwrap();

        assert_eq!(config.base_url, "http://flag.test");
        assert_eq!(config.workers, 3);
        assert_eq!(config.limit, Some(7));
        assert_eq!(config.layout, Layout::Partitioned);
    }

    #[test]
    fn test_output_dir_flag() {
        let config = runner(&["-o", "/tmp/snapshots", "config"])
            .resolve_config()
            .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/snapshots"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = runner(&["--base-url", "not a url", "config"])
            .resolve_config()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "base_url"));
    }

    #[test]
    fn test_missing_config_file() {
        let err = runner(&["--config", "/definitely/missing.yaml", "config"])
            .resolve_config()
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_selected_entities() {
        assert_eq!(selected_entities(None).unwrap(), Entity::ALL.to_vec());
        assert_eq!(selected_entities(Some("")).unwrap(), Entity::ALL.to_vec());
        assert_eq!(selected_entities(Some("  ")).unwrap(), Entity::ALL.to_vec());
        assert_eq!(
            selected_entities(Some("users,products")).unwrap(),
            vec![Entity::Products, Entity::Users]
        );
        assert!(selected_entities(Some(",")).is_err());
        assert!(selected_entities(Some("orders")).is_err());
    }

    #[tokio::test]
    async fn test_inspect_without_snapshot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&["-o", dir.path().to_str().unwrap(), "inspect", "users"]);
        assert!(matches!(
            runner.run().await.unwrap_err(),
            Error::FileNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_inspect_unknown_table() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&["-o", dir.path().to_str().unwrap(), "inspect", "orders"]);
        assert!(matches!(
            runner.run().await.unwrap_err(),
            Error::InvalidConfigValue { .. }
        ));
    }
}

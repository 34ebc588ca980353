//! Command-line and environment layer of the `bulk-update` job.
//!
//! Every flag can also be set through a `BULK_UPDATE_*` environment variable.
//! Flags win over variables, and both win over the configuration file.

use crate::config::JobConfig;
use crate::schema::Schema;
use anyhow::Result;
use clap::Parser;
use clap::builder::BoolishValueParser;
use std::path::PathBuf;

/// Updates a document collection from a Parquet dataset.
#[derive(Debug, Parser)]
#[command(name = "bulk-update")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, env = "BULK_UPDATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Parquet file, directory or glob pattern
    #[arg(short, long, env = "BULK_UPDATE_SOURCE_PATH")]
    pub path: Option<PathBuf>,

    /// Number of rows per batch
    #[arg(
        short,
        long,
        env = "BULK_UPDATE_READ_BATCH_SIZE",
        value_parser = clap::value_parser!(u64).range(1_000..=100_000_000)
    )]
    pub batch_size: Option<u64>,

    /// Number of concurrent update tasks
    #[arg(
        short,
        long,
        env = "BULK_UPDATE_CONCURRENCY_LIMIT",
        value_parser = clap::value_parser!(u64).range(1..=100)
    )]
    pub concurrent_tasks: Option<u64>,

    /// Stop each bulk write at its first rejected operation
    #[arg(
        long,
        env = "BULK_UPDATE_ORDERED_EXECUTION",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub ordered: Option<bool>,

    /// Target database name
    #[arg(long, env = "BULK_UPDATE_DATABASE")]
    pub database: Option<String>,

    /// Target collection name
    #[arg(long, env = "BULK_UPDATE_COLLECTION")]
    pub collection: Option<String>,

    /// Field stamped with the current time on every update
    #[arg(long, env = "BULK_UPDATE_TIMESTAMP_FIELD")]
    pub timestamp_field: Option<String>,

    /// Dataset schema as a JSON field list, identifier first
    #[arg(long, env = "BULK_UPDATE_SCHEMA", value_parser = parse_schema)]
    pub schema: Option<Schema>,

    /// Write the resulting collection to this JSON Lines file
    #[arg(short, long, env = "BULK_UPDATE_OUTPUT")]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Layer the flags over the configuration file (or the defaults) and
    /// validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded or the
    /// merged configuration is invalid.
    pub fn into_config(self) -> Result<JobConfig> {
        let mut config = JobConfig::load(self.config.as_deref())?;
        if let Some(path) = self.path {
            config.source_path = path;
        }
        if let Some(n) = self.batch_size {
            config.read_batch_size = usize::try_from(n)?;
        }
        if let Some(n) = self.concurrent_tasks {
            config.concurrency_limit = usize::try_from(n)?;
        }
        if let Some(ordered) = self.ordered {
            config.ordered_execution = ordered;
        }
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(collection) = self.collection {
            config.collection = collection;
        }
        if let Some(field) = self.timestamp_field {
            config.timestamp_field = field;
        }
        if let Some(schema) = self.schema {
            config.schema = schema;
        }
        if self.output.is_some() {
            config.output = self.output;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_schema(s: &str) -> Result<Schema, String> {
    let schema: Schema = serde_json::from_str(s).map_err(|e| e.to_string())?;
    schema.validate().map_err(|e| e.to_string())?;
    Ok(schema)
}

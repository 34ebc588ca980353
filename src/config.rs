//! Job configuration.
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! `BULK_UPDATE_*` environment variables and command-line flags (see
//! [`crate::cli::Cli`]). [`JobConfig::validate`] runs last.

use crate::schema::Schema;
use crate::update::DEFAULT_TIMESTAMP_FIELD;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Accepted rows per read batch.
pub const READ_BATCH_SIZE_RANGE: RangeInclusive<usize> = 1_000..=100_000_000;
/// Accepted number of concurrent bulk writes.
pub const CONCURRENCY_LIMIT_RANGE: RangeInclusive<usize> = 1..=100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    /// Parquet file, directory or glob pattern.
    pub source_path: PathBuf,
    /// Rows per batch read from the dataset.
    pub read_batch_size: usize,
    /// Batches dispatched together; bounds in-flight bulk writes.
    pub concurrency_limit: usize,
    /// Stop each bulk write at its first rejected operation.
    pub ordered_execution: bool,
    pub database: String,
    pub collection: String,
    /// Field stamped with the server time on every update.
    pub timestamp_field: String,
    /// Where to write a JSON Lines snapshot of the store after the job.
    pub output: Option<PathBuf>,
    pub schema: Schema,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("assets/data/"),
            read_batch_size: 10_000,
            concurrency_limit: 10,
            ordered_execution: false,
            database: "bulk_update".to_string(),
            collection: "documents".to_string(),
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.to_string(),
            output: None,
            schema: Schema::default(),
        }
    }
}

impl JobConfig {
    /// Load a JSON configuration file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse config {}", path.display()))
    }

    /// Defaults, or `path` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Check ranges and the schema.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if !READ_BATCH_SIZE_RANGE.contains(&self.read_batch_size) {
            bail!(
                "read_batch_size {} outside {}..={}",
                self.read_batch_size,
                READ_BATCH_SIZE_RANGE.start(),
                READ_BATCH_SIZE_RANGE.end()
            );
        }
        if !CONCURRENCY_LIMIT_RANGE.contains(&self.concurrency_limit) {
            bail!(
                "concurrency_limit {} outside {}..={}",
                self.concurrency_limit,
                CONCURRENCY_LIMIT_RANGE.start(),
                CONCURRENCY_LIMIT_RANGE.end()
            );
        }
        if self.timestamp_field.is_empty() {
            bail!("timestamp_field must not be empty");
        }
        self.schema.validate().context("invalid schema")
    }
}

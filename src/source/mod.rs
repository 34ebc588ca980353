//! Parquet dataset reader.
//!
//! A [`ParquetDataset`] is a sorted set of Parquet files bound to a
//! [`Schema`]. [`read_batches`] streams it lazily as [`RowBatch`]es of at most
//! `batch_size` rows, file after file, projected to the schema's columns.
//!
//! Reading never fails the job: an absent dataset yields no batches, and a
//! read error in the middle of the stream is logged and ends the stream.

mod convert;

use crate::batch::RowBatch;
use crate::io::glob::resolve_files;
use crate::schema::Schema;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetErrorKind {
    /// No files at the given location.
    NotFound,
    /// A file could not be opened or its footer could not be read.
    Unreadable,
    /// A file lacks a non-nullable schema field, or provides a field with an
    /// incompatible type.
    SchemaMismatch,
}

/// Failure to open a dataset.
#[derive(Debug, Clone)]
pub struct DatasetError {
    pub kind: DatasetErrorKind,
    pub message: String,
    pub path: Option<PathBuf>,
}

impl DatasetError {
    pub fn new(kind: DatasetErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{:?}: {} ({})", self.kind, self.message, path.display()),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for DatasetError {}

// ============================================================================
// Dataset
// ============================================================================

/// A set of Parquet files checked against a schema.
#[derive(Clone, Debug)]
pub struct ParquetDataset {
    files: Vec<PathBuf>,
    total_rows: u64,
    num_row_groups: usize,
}

impl ParquetDataset {
    /// Resolve `location` (file, directory or glob pattern) and bind every
    /// file to `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetErrorKind::NotFound`] when nothing matches,
    /// [`DatasetErrorKind::Unreadable`] when a footer cannot be read, and
    /// [`DatasetErrorKind::SchemaMismatch`] when a file lacks a non-nullable
    /// schema field or stores a field with an incompatible type. Nullable
    /// fields missing from a file read as nulls.
    pub fn open(location: impl AsRef<Path>, schema: &Schema) -> Result<Self, DatasetError> {
        let location = location.as_ref();
        let files = resolve_files(location, "parquet").map_err(|e| {
            DatasetError::new(DatasetErrorKind::NotFound, format!("{e:#}")).with_path(location)
        })?;

        let mut total_rows = 0u64;
        let mut num_row_groups = 0usize;
        for path in &files {
            let builder = open_builder(path)?;
            bind_schema(builder.schema(), schema).map_err(|e| e.with_path(path))?;
            let meta = builder.metadata();
            num_row_groups += meta.num_row_groups();
            total_rows += meta
                .row_groups()
                .iter()
                .map(|rg| rg.num_rows().cast_unsigned())
                .sum::<u64>();
        }

        Ok(Self {
            files,
            total_rows,
            num_row_groups,
        })
    }

    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Row count over all files, from the Parquet footers.
    #[must_use]
    pub const fn total_rows(&self) -> u64 {
        self.total_rows
    }

    #[must_use]
    pub const fn num_row_groups(&self) -> usize {
        self.num_row_groups
    }
}

fn open_builder(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>, DatasetError> {
    let file = File::open(path).map_err(|e| {
        DatasetError::new(DatasetErrorKind::Unreadable, e.to_string()).with_path(path)
    })?;
    ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
        DatasetError::new(DatasetErrorKind::Unreadable, e.to_string()).with_path(path)
    })
}

fn bind_schema(file_schema: &arrow::datatypes::Schema, schema: &Schema) -> Result<(), DatasetError> {
    for field in schema.fields() {
        let Ok(column) = file_schema.field_with_name(&field.name) else {
            // optional columns absent from a file read as nulls
            if field.nullable {
                continue;
            }
            return Err(DatasetError::new(
                DatasetErrorKind::SchemaMismatch,
                format!("missing required column {}", field.name),
            ));
        };
        if !convert::accepts(field.data_type, column.data_type()) {
            return Err(DatasetError::new(
                DatasetErrorKind::SchemaMismatch,
                format!(
                    "column {} has type {}, expected {:?}",
                    field.name,
                    column.data_type(),
                    field.data_type
                ),
            ));
        }
    }
    Ok(())
}

/// Open a dataset, logging and swallowing the failure.
///
/// The job uses this so an unreadable dataset degrades to zero work.
#[must_use]
pub fn open_or_empty(location: impl AsRef<Path>, schema: &Schema) -> Option<ParquetDataset> {
    let location = location.as_ref();
    match ParquetDataset::open(location, schema) {
        Ok(dataset) => {
            info!(
                stage = "create dataset",
                path = %location.display(),
                files = dataset.files.len(),
                rows = dataset.total_rows,
                status = "success",
            );
            Some(dataset)
        }
        Err(error) => {
            error!(
                stage = "create dataset",
                path = %location.display(),
                %error,
                status = "failed",
            );
            None
        }
    }
}

// ============================================================================
// Batch Iterator
// ============================================================================

/// Lazily stream `dataset` as row batches of at most `batch_size` rows.
///
/// An absent dataset yields nothing. A `batch_size` of zero is read as one.
#[must_use]
pub fn read_batches(
    dataset: Option<&ParquetDataset>,
    schema: &Schema,
    batch_size: usize,
) -> RowBatchIter {
    RowBatchIter {
        pending: dataset.map(|d| d.files.iter().cloned().collect()).unwrap_or_default(),
        current: None,
        schema: schema.clone(),
        batch_size: batch_size.max(1),
    }
}

/// Iterator returned by [`read_batches`].
pub struct RowBatchIter {
    pending: VecDeque<PathBuf>,
    current: Option<(PathBuf, ParquetRecordBatchReader)>,
    schema: Schema,
    batch_size: usize,
}

impl RowBatchIter {
    fn open_reader(&self, path: &Path) -> Result<ParquetRecordBatchReader, DatasetError> {
        let builder = open_builder(path)?;
        let indices: Vec<usize> = self
            .schema
            .fields()
            .iter()
            .filter_map(|f| builder.schema().index_of(&f.name).ok())
            .collect();
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        builder
            .with_projection(mask)
            .with_batch_size(self.batch_size)
            .build()
            .map_err(|e| {
                DatasetError::new(DatasetErrorKind::Unreadable, e.to_string()).with_path(path)
            })
    }

    fn stop(&mut self) {
        self.pending.clear();
        self.current = None;
    }
}

impl Iterator for RowBatchIter {
    type Item = RowBatch;

    fn next(&mut self) -> Option<RowBatch> {
        loop {
            if let Some((path, reader)) = self.current.as_mut() {
                match reader.next() {
                    Some(Ok(batch)) if batch.num_rows() == 0 => continue,
                    Some(Ok(batch)) => return Some(convert::to_row_batch(&batch, &self.schema)),
                    Some(Err(e)) => {
                        error!(
                            stage = "read batches",
                            path = %path.display(),
                            error = %e,
                            "stopping dataset read"
                        );
                        self.stop();
                        return None;
                    }
                    None => self.current = None,
                }
            }

            let path = self.pending.pop_front()?;
            match self.open_reader(&path) {
                Ok(reader) => self.current = Some((path, reader)),
                Err(e) => {
                    error!(stage = "read batches", error = %e, "stopping dataset read");
                    self.stop();
                    return None;
                }
            }
        }
    }
}

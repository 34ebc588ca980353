//! Temporary directories, Parquet fixture files and snapshot readers.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[cfg(feature = "io-parquet")]
use arrow::datatypes::FieldRef;
#[cfg(feature = "io-parquet")]
use arrow::record_batch::RecordBatch;
#[cfg(feature = "io-parquet")]
use parquet::arrow::arrow_writer::ArrowWriter;
#[cfg(feature = "io-parquet")]
use parquet::file::properties::WriterProperties;
#[cfg(feature = "io-parquet")]
use serde::Serialize;
#[cfg(feature = "io-parquet")]
use serde_arrow::schema::{SchemaLike, TracingOptions};
#[cfg(feature = "io-parquet")]
use serde_arrow::to_record_batch;
#[cfg(feature = "io-parquet")]
use std::fs::create_dir_all;

/// A temporary directory that is automatically deleted when dropped.
pub struct TempDirPath {
    #[allow(dead_code)]
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// Create a new temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self { temp_dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the directory.
    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

/// Read a JSON Lines file (such as a store snapshot) into a `Vec<T>`,
/// skipping blank lines.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a line fails to parse;
/// the message carries the line number.
pub fn read_jsonl_output<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;

    let mut out = Vec::new();
    for (idx, line) in BufReader::new(f).lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", idx + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(
            serde_json::from_str(&line)
                .with_context(|| format!("parse line {} in {}", idx + 1, path.display()))?,
        );
    }
    Ok(out)
}

/// Write `rows` to a Parquet file, `rows_per_group` rows per row group.
///
/// The Arrow schema is traced from `T`; a `rows_per_group` of zero writes a
/// single row group. Parent directories are created.
///
/// # Errors
///
/// Returns an error if the schema cannot be traced from `T`, the rows cannot
/// be converted, or the file cannot be written.
#[cfg(feature = "io-parquet")]
pub fn write_parquet_rows<T>(
    path: impl AsRef<Path>,
    rows: &[T],
    rows_per_group: usize,
) -> Result<usize>
where
    T: Serialize + serde::Deserialize<'static>,
{
    let path = path.as_ref();
    let fields: Vec<FieldRef> = Vec::<FieldRef>::from_type::<T>(TracingOptions::default())
        .context("infer Arrow schema from type T")?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }

    let chunk = if rows_per_group == 0 {
        rows.len().max(1)
    } else {
        rows_per_group
    };

    let empty: RecordBatch = to_record_batch(&fields, &Vec::<T>::new()).context("build schema")?;
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let props = WriterProperties::builder().build();
    let mut writer =
        ArrowWriter::try_new(file, empty.schema(), Some(props)).context("create ArrowWriter")?;

    for group in rows.chunks(chunk) {
        let batch: RecordBatch =
            to_record_batch(&fields, &group).context("convert rows to RecordBatch")?;
        writer.write(&batch).context("write batch to parquet")?;
        writer.flush().context("flush row group")?;
    }
    writer.close().context("close ArrowWriter")?;

    Ok(rows.len())
}

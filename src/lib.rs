//! # parquet-upsert
//!
//! Applies a **Parquet dataset** to a **document store** as a one-shot bulk
//! upsert job. The dataset is read in bounded batches, batches are dispatched
//! in fixed-size slices with one concurrent bulk write per batch, and the
//! per-write counters are folded into a job summary.
//!
//! ## Pipeline
//!
//! ```text
//! source ─▶ slicing ─▶ dispatch ──────────────────────────▶ summary
//!                        │ per batch, concurrently:
//!                        │   to_records ─▶ UpdateBuilder ─▶ BulkWriteSink
//! ```
//!
//! - [`source`] - lazy `RowBatch` stream from Parquet files (feature `io-parquet`)
//! - [`slicing`] - groups the stream into slices of `concurrency_limit` batches
//! - [`batch`] - columnar batches and their row materialization
//! - [`update`] - update instructions and the [`UpdateBuilder`] capability
//! - [`dispatch`] - the bounded-concurrency [`DispatchEngine`]
//! - [`sink`] - the [`BulkWriteSink`] trait and the in-memory store
//! - [`summary`] - [`JobSummary`] aggregation
//! - [`job`] - wires it all together from a [`JobConfig`]
//! - [`cli`] - flags and `BULK_UPDATE_*` variables layered over the config file
//!
//! ## Quick Start
//!
//! ```no_run
//! use parquet_upsert::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = JobConfig {
//!     source_path: "assets/data/".into(),
//!     ..JobConfig::default()
//! };
//! let store = MemoryDocumentStore::new(&config.database, &config.collection);
//!
//! let summary = run_update(&config, &store)?;
//! println!("upserted {} documents", summary.totals.upserted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Model
//!
//! Nothing that happens to a single batch stops the job. An unreadable
//! dataset yields zero batches, records without an identifier are skipped,
//! and a failed bulk write is counted as a failed batch while its siblings
//! and later slices carry on. No write is retried.
//!
//! ## Feature Flags
//!
//! - `io-parquet` (default) - Parquet dataset reader, fixture writers and the
//!   `bulk-update` binary

pub mod batch;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod io;
pub mod job;
pub mod logging;
pub mod schema;
pub mod sink;
pub mod slicing;
pub mod summary;
pub mod testing;
pub mod update;
pub mod value;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod source;

// General re-exports
pub use batch::{RowBatch, RowRecord, to_records};
pub use config::JobConfig;
pub use dispatch::{DispatchEngine, JobClock, TaskOutcome};
pub use job::{engine_for, run_batches};
pub use schema::{Field, FieldType, Schema};
pub use sink::{BulkResult, BulkWriteError, BulkWriteSink, MemoryDocumentStore};
pub use slicing::{Slice, SliceExt, group};
pub use summary::JobSummary;
pub use update::{UpdateBuilder, UpdateInstruction, UpsertBuilder, build_instructions};
pub use value::Value;

// Gated re-exports
#[cfg(feature = "io-parquet")]
pub use job::run_update;

#[cfg(feature = "io-parquet")]
pub use source::{DatasetError, ParquetDataset, read_batches};

//! Testing utilities for bulk update jobs.
//!
//! - **Sinks**: [`RecordingSink`] counts calls and in-flight writes around any
//!   sink; [`FailingSink`] injects faults for chosen documents.
//! - **Fixtures**: [`FeatureRow`], [`sample_rows`] and [`sample_batch`] build
//!   data matching the default schema.
//! - **Mock I/O**: [`TempDirPath`], [`read_jsonl_output`] for snapshots and,
//!   with feature `io-parquet`, `write_parquet_rows` to put a small dataset on
//!   disk.
//!
//! # Example
//!
//! ```
//! use parquet_upsert::testing::*;
//! use parquet_upsert::{DispatchEngine, JobClock, MemoryDocumentStore, Schema};
//!
//! # fn main() -> anyhow::Result<()> {
//! let schema = Schema::default();
//! let store = MemoryDocumentStore::new("db", "coll");
//! let sink = RecordingSink::new(store.clone());
//! let engine = DispatchEngine::new(2, schema.id_field(), schema.update_fields())?;
//!
//! let outcomes = engine.dispatch(
//!     0,
//!     vec![sample_batch(0, 3), sample_batch(3, 3)],
//!     &sink,
//!     &JobClock::start(),
//! );
//! assert_eq!(outcomes.len(), 2);
//! assert_eq!(sink.calls(), 2);
//! assert_eq!(store.len(), 6);
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod mock_io;
pub mod sinks;

pub use fixtures::*;
pub use mock_io::*;
pub use sinks::*;

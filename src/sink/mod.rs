//! Bulk-write sinks.
//!
//! - [`BulkWriteSink`] - the trait the dispatch engine writes through
//! - [`MemoryDocumentStore`] - in-memory collection with upsert semantics,
//!   used by the `bulk-update` binary and by tests

pub mod memory;
pub mod traits;

pub use memory::{Document, MemoryDocumentStore};
pub use traits::{BulkResult, BulkWriteError, BulkWriteResult, BulkWriteSink, WriteError};

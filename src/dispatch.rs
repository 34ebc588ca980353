//! Bounded-concurrency bulk dispatch.
//!
//! The [`DispatchEngine`] takes one [`Slice`] of row batches at a time and runs
//! one task per batch on its own Rayon pool, sized to the concurrency limit:
//!
//! 1. materialize the batch into records,
//! 2. build the update instructions,
//! 3. submit them as a single bulk write, unless there is nothing to submit.
//!
//! `dispatch` returns only once every task of the slice has finished, so
//! slices never overlap and at most `concurrency_limit` bulk writes are in
//! flight. A failing task is turned into a [`TaskOutcome::Failed`] at its own
//! boundary and never disturbs its siblings.

use crate::batch::{RowBatch, to_records};
use crate::sink::{BulkResult, BulkWriteError, BulkWriteSink};
use crate::slicing::Slice;
use crate::summary::consolidate;
use crate::update::{UpdateBuilder, UpsertBuilder, build_instructions};
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Start of a job, handed to the engine for elapsed-time reporting.
#[derive(Clone, Copy, Debug)]
pub struct JobClock {
    started: Instant,
}

impl JobClock {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Seconds since start, rounded to a tenth.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        (self.elapsed().as_secs_f64() * 10.0).round() / 10.0
    }
}

impl Default for JobClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Result of one dispatch task.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskOutcome {
    /// Every operation was applied.
    Written(BulkResult),
    /// The sink rejected some operations; the counters cover the rest.
    Partial(BulkResult),
    /// The batch produced no instructions, so the sink was not called.
    Skipped,
    /// The bulk write failed as a whole.
    Failed(BulkWriteError),
}

impl TaskOutcome {
    /// Counters of the task, absent when nothing was written.
    #[must_use]
    pub const fn counters(&self) -> Option<BulkResult> {
        match self {
            Self::Written(counts) | Self::Partial(counts) => Some(*counts),
            Self::Skipped | Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Runs slices of row batches against a sink with a fixed concurrency limit.
pub struct DispatchEngine {
    pool: ThreadPool,
    concurrency_limit: usize,
    id_field: String,
    fields: Vec<String>,
    ordered: bool,
    builder: Arc<dyn UpdateBuilder>,
}

impl DispatchEngine {
    /// Create an engine with `concurrency_limit` workers, upserting `fields`
    /// keyed by `id_field` with the default [`UpsertBuilder`].
    ///
    /// # Errors
    ///
    /// Returns an error if `concurrency_limit` is zero or the worker pool
    /// cannot be created.
    pub fn new(
        concurrency_limit: usize,
        id_field: impl Into<String>,
        fields: Vec<String>,
    ) -> Result<Self> {
        if concurrency_limit == 0 {
            bail!("concurrency limit must be at least 1");
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency_limit)
            .thread_name(|i| format!("bulk-dispatch-{i}"))
            .build()
            .context("build dispatch thread pool")?;
        Ok(Self {
            pool,
            concurrency_limit,
            id_field: id_field.into(),
            fields,
            ordered: false,
            builder: Arc::new(UpsertBuilder::default()),
        })
    }

    /// Stop each bulk write at its first rejected operation.
    #[must_use]
    pub const fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Replace the instruction builder.
    #[must_use]
    pub fn with_builder(mut self, builder: Arc<dyn UpdateBuilder>) -> Self {
        self.builder = builder;
        self
    }

    #[must_use]
    pub const fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Run every batch of `slice` concurrently and wait for all of them.
    ///
    /// Returns one outcome per batch, in the order the batches were given.
    pub fn dispatch(
        &self,
        slice_index: usize,
        slice: Slice<RowBatch>,
        sink: &dyn BulkWriteSink,
        clock: &JobClock,
    ) -> Vec<TaskOutcome> {
        let n_tasks = slice.len();
        if n_tasks > self.concurrency_limit {
            warn!(
                slice_index,
                n_tasks,
                concurrency_limit = self.concurrency_limit,
                "slice is larger than the concurrency limit; tasks will queue"
            );
        }

        let start_time = clock.elapsed_secs();
        info!(
            stage = "created concurrent tasks",
            slice_index, start_time, n_tasks, status = "success"
        );

        let outcomes: Vec<TaskOutcome> = self.pool.install(|| {
            slice
                .into_par_iter()
                .enumerate()
                .map(|(task_index, batch)| self.run_task(slice_index, task_index, &batch, sink))
                .collect()
        });

        let finish_time = clock.elapsed_secs();
        let counts = consolidate(&outcomes);
        info!(
            stage = "executed concurrent tasks",
            slice_index,
            finish_time,
            duration_sec = ((finish_time - start_time) * 10.0).round() / 10.0,
            n_results = outcomes.len(),
            n_failed = outcomes.iter().filter(|o| o.is_failed()).count(),
            n_matched = counts.matched,
            n_upserted = counts.upserted,
            status = "success"
        );

        outcomes
    }

    fn run_task(
        &self,
        slice_index: usize,
        task_index: usize,
        batch: &RowBatch,
        sink: &dyn BulkWriteSink,
    ) -> TaskOutcome {
        let records = to_records(Some(batch));
        let instructions = build_instructions(
            records.as_deref(),
            &self.id_field,
            &self.fields,
            self.builder.as_ref(),
        );

        let instructions = match instructions {
            Some(list) if !list.is_empty() => list,
            _ => {
                warn!(
                    stage = "bulk write",
                    slice_index, task_index, "no update statements; skipping batch"
                );
                return TaskOutcome::Skipped;
            }
        };

        let n_statements = instructions.len();
        let result = catch_unwind(AssertUnwindSafe(|| {
            sink.bulk_write(&instructions, self.ordered)
        }))
        .unwrap_or_else(|payload| Err(BulkWriteError::transport(panic_message(payload.as_ref()))));

        match result {
            Ok(counts) => {
                debug!(
                    stage = "bulk write",
                    slice_index,
                    task_index,
                    n_statements,
                    matched = counts.matched,
                    modified = counts.modified,
                    upserted = counts.upserted,
                    inserted = counts.inserted,
                    status = "success",
                );
                TaskOutcome::Written(counts)
            }
            Err(BulkWriteError::Partial {
                counts,
                write_errors,
            }) => {
                error!(
                    stage = "bulk write",
                    slice_index,
                    task_index,
                    n_statements,
                    rejected = write_errors.len(),
                    first_error = write_errors.first().map(|e| e.message.as_str()),
                    matched = counts.matched,
                    modified = counts.modified,
                    upserted = counts.upserted,
                    inserted = counts.inserted,
                    status = "partial",
                );
                TaskOutcome::Partial(counts)
            }
            Err(e) => {
                error!(
                    stage = "bulk write",
                    slice_index,
                    task_index,
                    n_statements,
                    error = %e,
                    status = "failed",
                );
                TaskOutcome::Failed(e)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .map_or_else(
            || "bulk write panicked".to_string(),
            |msg| format!("bulk write panicked: {msg}"),
        )
}

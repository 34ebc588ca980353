//! Job orchestration: read → slice → dispatch → aggregate.

use crate::batch::RowBatch;
use crate::config::JobConfig;
use crate::dispatch::{DispatchEngine, JobClock};
use crate::sink::BulkWriteSink;
use crate::slicing::SliceExt;
use crate::summary::JobSummary;
use crate::update::UpsertBuilder;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Dispatch every slice of `batches` through `engine`, one slice at a time.
///
/// Batches are grouped by the engine's concurrency limit. Per-batch failures
/// are counted in the summary; they never stop the run.
pub fn run_batches<I>(
    batches: I,
    engine: &DispatchEngine,
    sink: &dyn BulkWriteSink,
    clock: &JobClock,
) -> JobSummary
where
    I: IntoIterator<Item = RowBatch>,
{
    let mut summary = JobSummary::new();
    for (slice_index, slice) in batches
        .into_iter()
        .slices(engine.concurrency_limit())
        .enumerate()
    {
        let outcomes = engine.dispatch(slice_index, slice, sink, clock);
        summary.record(&outcomes);
    }
    summary.elapsed = clock.elapsed();
    summary
}

/// Run the whole job described by `config` against `sink`.
///
/// An unreadable dataset is logged and results in an empty summary.
///
/// # Errors
///
/// Returns an error only for an invalid configuration or when the dispatch
/// pool cannot be created.
#[cfg(feature = "io-parquet")]
pub fn run_update(config: &JobConfig, sink: &dyn BulkWriteSink) -> Result<JobSummary> {
    use crate::source::{open_or_empty, read_batches};

    config.validate()?;
    let clock = JobClock::start();
    let schema = &config.schema;

    info!(
        stage = "start job",
        path = %config.source_path.display(),
        batch_size = config.read_batch_size,
        concurrent_tasks = config.concurrency_limit,
        ordered = config.ordered_execution,
        namespace = %sink.namespace(),
    );

    let engine = engine_for(config)?;
    let dataset = open_or_empty(&config.source_path, schema);
    let batches = read_batches(dataset.as_ref(), schema, config.read_batch_size);

    let summary = run_batches(batches, &engine, sink, &clock);
    log_summary(&summary);
    Ok(summary)
}

/// Build the dispatch engine a configuration describes.
///
/// # Errors
///
/// Returns an error when the dispatch pool cannot be created.
pub fn engine_for(config: &JobConfig) -> Result<DispatchEngine> {
    let builder = UpsertBuilder::new().with_timestamp_field(config.timestamp_field.clone());
    Ok(DispatchEngine::new(
        config.concurrency_limit,
        config.schema.id_field(),
        config.schema.update_fields(),
    )?
    .ordered(config.ordered_execution)
    .with_builder(Arc::new(builder)))
}

/// Emit the final summary as one structured event.
pub fn log_summary(summary: &JobSummary) {
    info!(
        stage = "finish read and update",
        n_matched = summary.totals.matched,
        n_modified = summary.totals.modified,
        n_upserted = summary.totals.upserted,
        n_inserted = summary.totals.inserted,
        slices = summary.slices,
        batches = summary.batches,
        written = summary.written,
        partial = summary.partial,
        skipped = summary.skipped,
        failed = summary.failed,
        duration_sec = (summary.elapsed.as_secs_f64() * 10.0).round() / 10.0,
    );
}

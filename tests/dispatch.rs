use anyhow::Result;
use parquet_upsert::testing::{
    FailingSink, Fault, RecordingSink, batch_without_ids, sample_batch, sample_id,
};
use parquet_upsert::sink::BulkWriteResult;
use parquet_upsert::{
    BulkResult, BulkWriteError, BulkWriteSink, DispatchEngine, JobClock, MemoryDocumentStore,
    RowBatch, Schema, TaskOutcome, UpdateInstruction, Value, run_batches,
};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

fn engine(limit: usize) -> Result<DispatchEngine> {
    let schema = Schema::default();
    DispatchEngine::new(limit, schema.id_field(), schema.update_fields())
}

/// Three batches of ten rows, keyed `0..10`, `10..20` and `20..30`.
fn three_batches() -> Vec<RowBatch> {
    (0..3).map(|i| sample_batch(i * 10, 10)).collect()
}

#[test]
fn every_batch_is_written() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let outcomes = engine(3)?.dispatch(0, three_batches(), &store, &JobClock::start());

    assert_eq!(outcomes, vec![TaskOutcome::Written(BulkResult::new(0, 0, 10, 0)); 3]);
    assert_eq!(store.len(), 30);
    Ok(())
}

#[test]
fn transport_failure_is_isolated() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let sink = FailingSink::new(store.clone(), "_id", sample_id(10), Fault::Transport);

    let outcomes = engine(3)?.dispatch(0, three_batches(), &sink, &JobClock::start());

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0], TaskOutcome::Written(BulkResult::new(0, 0, 10, 0)));
    assert!(matches!(outcomes[1], TaskOutcome::Failed(BulkWriteError::Transport { .. })));
    assert_eq!(outcomes[2], TaskOutcome::Written(BulkResult::new(0, 0, 10, 0)));

    assert_eq!(store.len(), 20);
    assert!(store.get("_id", sample_id(15)).is_none());
    assert!(store.get("_id", sample_id(25)).is_some());
    Ok(())
}

#[test]
fn panicking_write_becomes_failed_outcome() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let sink = FailingSink::new(store.clone(), "_id", sample_id(0), Fault::Panic);

    let outcomes = engine(3)?.dispatch(0, three_batches(), &sink, &JobClock::start());

    let TaskOutcome::Failed(err) = &outcomes[0] else {
        panic!("expected a failed outcome, got {:?}", outcomes[0]);
    };
    assert!(err.to_string().contains("panicked"), "{err}");
    assert!(outcomes[1..].iter().all(|o| o.counters().is_some()));
    assert_eq!(store.len(), 20);
    Ok(())
}

#[test]
fn rejected_documents_give_partial_outcome() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let sink = FailingSink::new(store.clone(), "_id", sample_id(12), Fault::Reject);

    let outcomes = engine(3)?.dispatch(0, three_batches(), &sink, &JobClock::start());
    assert_eq!(outcomes[1], TaskOutcome::Partial(BulkResult::new(0, 0, 9, 0)));
    assert_eq!(store.len(), 29);
    Ok(())
}

#[test]
fn ordered_write_stops_at_rejection() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let sink = FailingSink::new(store.clone(), "_id", sample_id(12), Fault::Reject);

    let outcomes = engine(3)?
        .ordered(true)
        .dispatch(0, three_batches(), &sink, &JobClock::start());
    // rows 10 and 11 precede the rejected row
    assert_eq!(outcomes[1], TaskOutcome::Partial(BulkResult::new(0, 0, 2, 0)));
    assert_eq!(store.len(), 22);
    Ok(())
}

#[test]
fn batch_without_statements_is_skipped() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let sink = RecordingSink::new(store.clone());

    let slice = vec![sample_batch(0, 5), batch_without_ids(5), RowBatch::default()];
    let outcomes = engine(3)?.dispatch(0, slice, &sink, &JobClock::start());

    assert_eq!(
        outcomes,
        vec![
            TaskOutcome::Written(BulkResult::new(0, 0, 5, 0)),
            TaskOutcome::Skipped,
            TaskOutcome::Skipped,
        ]
    );
    assert_eq!(sink.calls(), 1);
    assert_eq!(sink.instructions(), 5);
    Ok(())
}

#[test]
fn float_identifiers_are_written() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let batch = RowBatch::from_columns([
        ("key", vec![Value::from(0.5), Value::from(1.5)]),
        ("x", vec![Value::from(1), Value::from(2)]),
    ]);
    let engine = DispatchEngine::new(1, "key", vec!["x".to_string()])?;

    let outcomes = engine.dispatch(0, vec![batch], &store, &JobClock::start());
    assert_eq!(outcomes, vec![TaskOutcome::Written(BulkResult::new(0, 0, 2, 0))]);
    assert!(store.get("key", 1.5).is_some());
    Ok(())
}

#[test]
fn empty_slice_does_nothing() -> Result<()> {
    let sink = RecordingSink::new(MemoryDocumentStore::new("db", "coll"));
    let outcomes = engine(2)?.dispatch(0, Vec::new(), &sink, &JobClock::start());
    assert!(outcomes.is_empty());
    assert_eq!(sink.calls(), 0);
    Ok(())
}

#[test]
fn in_flight_writes_never_exceed_limit() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let sink = RecordingSink::new(store.clone()).with_delay(Duration::from_millis(50));
    let batches: Vec<RowBatch> = (0..5).map(|i| sample_batch(i * 4, 4)).collect();

    let summary = run_batches(batches, &engine(2)?, &sink, &JobClock::start());

    assert_eq!(summary.slices, 3);
    assert_eq!(summary.batches, 5);
    assert_eq!(sink.calls(), 5);
    assert_eq!(sink.max_in_flight(), 2);
    assert_eq!(summary.totals, BulkResult::new(0, 0, 20, 0));
    assert_eq!(store.len(), 20);
    Ok(())
}

#[test]
fn oversized_slice_still_respects_pool_size() -> Result<()> {
    let sink = RecordingSink::new(MemoryDocumentStore::new("db", "coll"))
        .with_delay(Duration::from_millis(20));
    let slice: Vec<RowBatch> = (0..6).map(|i| sample_batch(i * 2, 2)).collect();

    let outcomes = engine(2)?.dispatch(0, slice, &sink, &JobClock::start());

    assert_eq!(outcomes.len(), 6);
    assert!(sink.max_in_flight() <= 2);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Start(usize),
    End(usize),
}

/// Logs the start and end of every call, tagged with the slice the batch
/// belongs to. Batch `b` holds ids `4b..4b + 4`, slices hold `per_slice`
/// batches.
struct SliceLog {
    store: MemoryDocumentStore,
    per_slice: usize,
    events: Mutex<Vec<Event>>,
}

impl SliceLog {
    fn slice_of(&self, instructions: &[UpdateInstruction]) -> usize {
        let Some(Value::String(id)) = instructions[0].filter_value("_id") else {
            panic!("string id expected");
        };
        let row: usize = id.trim_start_matches("id-").parse().expect("numeric id");
        row / 4 / self.per_slice
    }

    fn push(&self, event: Event) {
        self.events.lock().expect("events").push(event);
    }
}

impl BulkWriteSink for SliceLog {
    fn bulk_write(&self, instructions: &[UpdateInstruction], ordered: bool) -> BulkWriteResult {
        let slice = self.slice_of(instructions);
        self.push(Event::Start(slice));
        thread::sleep(Duration::from_millis(30));
        let result = self.store.bulk_write(instructions, ordered);
        self.push(Event::End(slice));
        result
    }
}

#[test]
fn slices_never_overlap() -> Result<()> {
    let sink = SliceLog {
        store: MemoryDocumentStore::new("db", "coll"),
        per_slice: 3,
        events: Mutex::new(Vec::new()),
    };
    let batches: Vec<RowBatch> = (0..5).map(|i| sample_batch(i * 4, 4)).collect();

    let summary = run_batches(batches, &engine(3)?, &sink, &JobClock::start());
    assert_eq!(summary.slices, 2);

    let events = sink.events.into_inner().expect("events");
    assert_eq!(events.len(), 10);
    let last_end_of_first = events
        .iter()
        .rposition(|e| *e == Event::End(0))
        .expect("slice 0 ended");
    let first_start_of_second = events
        .iter()
        .position(|e| *e == Event::Start(1))
        .expect("slice 1 started");
    assert!(last_end_of_first < first_start_of_second, "{events:?}");

    // the three batches of the first slice ran side by side
    assert_eq!(
        &events[..3],
        &[Event::Start(0), Event::Start(0), Event::Start(0)],
        "{events:?}"
    );
    Ok(())
}

#[test]
fn second_run_matches_existing_documents() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let engine = engine(2)?;
    let clock = JobClock::start();

    let first = run_batches(three_batches(), &engine, &store, &clock);
    let second = run_batches(three_batches(), &engine, &store, &clock);

    assert_eq!(first.totals, BulkResult::new(0, 0, 30, 0));
    assert_eq!(second.totals.matched, 30);
    assert_eq!(second.totals.upserted, 0);
    assert_eq!(store.len(), 30);
    Ok(())
}

#[test]
fn failure_does_not_stop_later_slices() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let sink = FailingSink::new(store.clone(), "_id", sample_id(0), Fault::Transport);

    let summary = run_batches(three_batches(), &engine(1)?, &sink, &JobClock::start());

    assert_eq!(summary.slices, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 2);
    assert!(!summary.is_clean());
    assert_eq!(summary.totals.upserted, 20);
    Ok(())
}

#[test]
fn zero_limit_is_rejected() {
    assert!(engine(0).is_err());
}

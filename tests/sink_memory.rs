// Behaviour of the in-memory document store used as the default sink.

use anyhow::Result;
use parquet_upsert::sink::{BulkWriteError, Document};
use parquet_upsert::testing::{TempDirPath, read_jsonl_output};
use parquet_upsert::{BulkResult, BulkWriteSink, MemoryDocumentStore, UpdateInstruction, Value};
use std::collections::BTreeMap;

fn upsert(id: impl Into<Value>, set: &[(&str, Value)]) -> UpdateInstruction {
    UpdateInstruction {
        filter: BTreeMap::from([("_id".to_string(), id.into())]),
        set: set
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect(),
        current_date: vec!["updatedAt".to_string()],
        upsert: true,
        multi: false,
    }
}

#[test]
fn upsert_inserts_then_updates() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");

    let first = store.bulk_write(
        &[
            upsert("a", &[("score", Value::from(1.0))]),
            upsert("b", &[("score", Value::from(2.0))]),
        ],
        false,
    )?;
    assert_eq!(first, BulkResult::new(0, 0, 2, 0));
    assert_eq!(store.len(), 2);

    let second = store.bulk_write(
        &[
            upsert("a", &[("score", Value::from(5.0))]),
            upsert("c", &[("score", Value::from(3.0))]),
        ],
        false,
    )?;
    assert_eq!(second, BulkResult::new(1, 1, 1, 0));

    let a = store.get("_id", "a").expect("document a");
    assert_eq!(a.get("score"), Some(&Value::Float(5.0)));
    assert!(matches!(a.get("updatedAt"), Some(Value::Timestamp(_))));
    assert_eq!(a.get("_id"), Some(&Value::from("a")));
    Ok(())
}

#[test]
fn unset_fields_are_left_alone() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    store.bulk_write(
        &[upsert(
            "a",
            &[("feature_1", Value::from(1.0)), ("feature_2", Value::from(2.0))],
        )],
        false,
    )?;
    store.bulk_write(&[upsert("a", &[("feature_1", Value::from(9.0))])], false)?;

    let a = store.get("_id", "a").expect("document a");
    assert_eq!(a.get("feature_1"), Some(&Value::Float(9.0)));
    assert_eq!(a.get("feature_2"), Some(&Value::Float(2.0)));
    Ok(())
}

#[test]
fn empty_list_is_invalid() {
    let store = MemoryDocumentStore::new("db", "coll");
    let err = store.bulk_write(&[], false).expect_err("empty write");
    assert!(matches!(err, BulkWriteError::InvalidInput { .. }));
}

#[test]
fn non_upsert_miss_changes_nothing() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let mut instruction = upsert("ghost", &[("x", Value::from(1))]);
    instruction.upsert = false;

    let counts = store.bulk_write(&[instruction], false)?;
    assert!(counts.is_zero());
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn unordered_write_continues_past_rejections() {
    let store = MemoryDocumentStore::new("db", "coll");
    let ops = [
        upsert("a", &[("x", Value::from(1))]),
        // changing the key is rejected
        upsert("b", &[("_id", Value::from("other"))]),
        // NaN cannot be a key
        upsert(f64::NAN, &[("x", Value::from(1))]),
        upsert("d", &[("x", Value::from(1))]),
    ];

    let err = store.bulk_write(&ops, false).expect_err("partial failure");
    let BulkWriteError::Partial {
        counts,
        write_errors,
    } = err
    else {
        panic!("expected a partial failure, got {err:?}");
    };
    assert_eq!(counts, BulkResult::new(0, 0, 2, 0));
    let indexes: Vec<usize> = write_errors.iter().map(|e| e.index).collect();
    assert_eq!(indexes, vec![1, 2]);
    assert_eq!(store.len(), 2);
}

#[test]
fn ordered_write_stops_at_first_rejection() {
    let store = MemoryDocumentStore::new("db", "coll");
    let ops = [
        upsert("a", &[("x", Value::from(1))]),
        upsert("b", &[("_id", Value::from("other"))]),
        upsert("c", &[("x", Value::from(1))]),
    ];

    let err = store.bulk_write(&ops, true).expect_err("partial failure");
    assert_eq!(err.partial_counts(), Some(BulkResult::new(0, 0, 1, 0)));
    assert!(store.get("_id", "c").is_none());
}

#[test]
fn setting_key_to_same_value_is_allowed() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    store.bulk_write(&[upsert("a", &[("_id", Value::from("a"))])], false)?;
    assert_eq!(store.len(), 1);
    Ok(())
}

#[test]
fn any_finite_scalar_is_a_key() -> Result<()> {
    let store = MemoryDocumentStore::new("db", "coll");
    let counts = store.bulk_write(
        &[
            upsert(1.5, &[("x", Value::from(1))]),
            upsert(7, &[("x", Value::from(1))]),
            upsert(true, &[("x", Value::from(1))]),
            upsert(Value::Timestamp(1_000), &[("x", Value::from(1))]),
        ],
        false,
    )?;
    assert_eq!(counts, BulkResult::new(0, 0, 4, 0));
    assert!(store.get("_id", 1.5).is_some());

    let err = store
        .bulk_write(&[upsert(Value::Null, &[("x", Value::from(1))])], false)
        .expect_err("null key");
    assert_eq!(err.partial_counts(), Some(BulkResult::default()));
    Ok(())
}

#[test]
fn seed_and_snapshot() -> Result<()> {
    let tmp = TempDirPath::new()?;
    let store = MemoryDocumentStore::new("db", "coll");
    assert_eq!(store.namespace(), "db.coll");

    let doc: Document = BTreeMap::from([
        ("_id".to_string(), Value::from("z")),
        ("score".to_string(), Value::from(0.5)),
    ]);
    store.seed("_id", doc)?;
    store.bulk_write(&[upsert("a", &[("score", Value::from(1.0))])], false)?;

    let path = tmp.file("out/snapshot.jsonl");
    let n = store.snapshot_jsonl(&path)?;
    assert_eq!(n, 2);

    let rows: Vec<serde_json::Value> = read_jsonl_output(&path)?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["_id"], "a");
    assert_eq!(rows[1]["_id"], "z");
    assert_eq!(rows[1]["score"], 0.5);
    assert!(rows[0]["updatedAt"].is_i64());
    Ok(())
}

//! Sample data matching the default schema.

use crate::batch::RowBatch;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// One row of the default schema (`_id`, four optional features, `score`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    #[serde(rename = "_id")]
    pub id: String,
    pub feature_1: Option<f64>,
    pub feature_2: Option<f64>,
    pub feature_3: Option<f64>,
    pub feature_4: Option<f64>,
    pub score: f64,
}

/// Document key used by the fixtures for row `i`.
#[must_use]
pub fn sample_id(i: usize) -> String {
    format!("id-{i:06}")
}

#[allow(clippy::cast_precision_loss)]
fn sample_row(i: usize) -> FeatureRow {
    let x = i as f64;
    FeatureRow {
        id: sample_id(i),
        feature_1: Some(x),
        // every other row leaves feature_2 unset
        feature_2: (i % 2 == 0).then_some(x * 2.0),
        feature_3: Some(x / 4.0),
        feature_4: None,
        score: x / 10.0,
    }
}

/// Rows `start..start + len`, deterministic.
///
/// # Example
///
/// ```
/// use parquet_upsert::testing::sample_rows;
///
/// let rows = sample_rows(0, 4);
/// assert_eq!(rows.len(), 4);
/// assert_eq!(rows[1].id, "id-000001");
/// assert!(rows[1].feature_2.is_none());
/// ```
#[must_use]
pub fn sample_rows(start: usize, len: usize) -> Vec<FeatureRow> {
    (start..start + len).map(sample_row).collect()
}

/// The columnar form of [`sample_rows`].
#[must_use]
pub fn sample_batch(start: usize, len: usize) -> RowBatch {
    rows_to_batch(&sample_rows(start, len))
}

/// Transpose feature rows into a [`RowBatch`] in schema order.
#[must_use]
pub fn rows_to_batch(rows: &[FeatureRow]) -> RowBatch {
    RowBatch::from_columns([
        ("_id", rows.iter().map(|r| Value::from(r.id.as_str())).collect()),
        ("feature_1", rows.iter().map(|r| Value::from(r.feature_1)).collect()),
        ("feature_2", rows.iter().map(|r| Value::from(r.feature_2)).collect()),
        ("feature_3", rows.iter().map(|r| Value::from(r.feature_3)).collect()),
        ("feature_4", rows.iter().map(|r| Value::from(r.feature_4)).collect()),
        ("score", rows.iter().map(|r| Value::from(r.score)).collect()),
    ])
}

/// A batch in which no row has an identifier, so it yields no instructions.
#[must_use]
pub fn batch_without_ids(len: usize) -> RowBatch {
    let rows = sample_rows(0, len);
    RowBatch::from_columns([
        ("_id", vec![Value::Null; len]),
        ("score", rows.iter().map(|r| Value::from(r.score)).collect()),
    ])
}

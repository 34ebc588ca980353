//! Columnar row batches and their row-wise materialization.
//!
//! A [`RowBatch`] is what the dataset reader hands to the dispatch engine: a
//! set of equally long, named columns. [`to_records`] turns it into one
//! [`RowRecord`] per row, in row order, before update instructions are built.

use crate::value::Value;
use std::collections::BTreeMap;

/// One row of a batch: field name → value. Nulls are kept as [`Value::Null`].
pub type RowRecord = BTreeMap<String, Value>;

/// A columnar chunk of the dataset.
///
/// Columns keep their schema order. All columns are expected to have the same
/// length; the reader guarantees this and nothing downstream re-checks it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowBatch {
    columns: Vec<(String, Vec<Value>)>,
}

impl RowBatch {
    #[must_use]
    pub fn new(columns: Vec<(String, Vec<Value>)>) -> Self {
        Self { columns }
    }

    /// Build a batch from `(name, values)` pairs.
    ///
    /// # Example
    /// ```
    /// use parquet_upsert::{RowBatch, Value};
    ///
    /// let batch = RowBatch::from_columns([
    ///     ("a", vec![Value::from(1), Value::from(2)]),
    ///     ("b", vec![Value::from("x"), Value::from("y")]),
    /// ]);
    /// assert_eq!(batch.num_rows(), 2);
    /// ```
    pub fn from_columns<N, I>(columns: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<Value>)>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, values)| (name.into(), values))
                .collect(),
        }
    }

    /// Row count, taken from the first column.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, values)| values.len())
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// A batch without columns carries nothing to process.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }
}

/// Materialize a columnar batch into row records.
///
/// Returns `None` for an absent batch or one without columns ("nothing to
/// process"), and `Some(vec![])` for a batch whose columns hold zero rows.
/// Every record carries every column. A column shorter than the first one
/// reads as [`Value::Null`] past its end instead of panicking.
#[must_use]
pub fn to_records(batch: Option<&RowBatch>) -> Option<Vec<RowRecord>> {
    let batch = batch.filter(|b| !b.is_empty())?;
    let rows = (0..batch.num_rows())
        .map(|row| {
            batch
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values.get(row).cloned().unwrap_or_default()))
                .collect::<RowRecord>()
        })
        .collect();
    Some(rows)
}

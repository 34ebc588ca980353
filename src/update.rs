//! Update instructions and the builders that derive them from row records.
//!
//! An [`UpdateInstruction`] is the store-agnostic form of one document update:
//! a key filter, the fields to `$set`, the fields to stamp with the server's
//! current date, and the upsert/multi flags. Instructions are produced by an
//! [`UpdateBuilder`]; [`UpsertBuilder`] is the default policy:
//!
//! 1. no record → nothing;
//! 2. no identifier value → nothing;
//! 3. no fields to update → nothing;
//! 4. otherwise filter on the identifier and `$set` every non-null field.
//!
//! Null fields are left out of `$set` rather than written as null, so a row
//! only ever updates the fields it actually carries.

use crate::batch::RowRecord;
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Name of the timestamp field touched on every update by default.
pub const DEFAULT_TIMESTAMP_FIELD: &str = "updatedAt";

/// One per-document update operation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpdateInstruction {
    /// Equality filter, `{id_field: id}` for instructions built from records.
    pub filter: BTreeMap<String, Value>,
    /// Fields assigned by the update.
    pub set: BTreeMap<String, Value>,
    /// Fields set to the server's current date when the update is applied.
    pub current_date: Vec<String>,
    /// Insert a new document when the filter matches none.
    pub upsert: bool,
    /// Apply to every matching document instead of the first one.
    pub multi: bool,
}

impl UpdateInstruction {
    /// The filter value for `field`, if the filter constrains it.
    #[must_use]
    pub fn filter_value(&self, field: &str) -> Option<&Value> {
        self.filter.get(field)
    }
}

/// Capability that turns a row record into an update instruction.
///
/// Implementations must be cheap to share across dispatch workers.
pub trait UpdateBuilder: Send + Sync {
    /// Build the instruction for `record`, or `None` when the record must be
    /// skipped.
    fn build(
        &self,
        record: Option<&RowRecord>,
        id_field: &str,
        fields: &[String],
    ) -> Option<UpdateInstruction>;
}

/// Upsert keyed by the identifier column, stamping a timestamp field.
#[derive(Clone, Debug)]
pub struct UpsertBuilder {
    timestamp_field: String,
    multi: bool,
}

impl Default for UpsertBuilder {
    fn default() -> Self {
        Self {
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.to_string(),
            multi: false,
        }
    }
}

impl UpsertBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build instructions that apply to every document matching the filter.
    #[must_use]
    pub fn many() -> Self {
        Self {
            multi: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = field.into();
        self
    }

    #[must_use]
    pub fn timestamp_field(&self) -> &str {
        &self.timestamp_field
    }
}

impl UpdateBuilder for UpsertBuilder {
    fn build(
        &self,
        record: Option<&RowRecord>,
        id_field: &str,
        fields: &[String],
    ) -> Option<UpdateInstruction> {
        let Some(record) = record else {
            warn!(stage = "make update statement", "no record to make update statement");
            return None;
        };

        let Some(id) = record.get(id_field).filter(|v| !v.is_null()) else {
            warn!(
                stage = "make update statement",
                id_field, "no id to make update statement"
            );
            return None;
        };

        if fields.is_empty() {
            warn!(stage = "make update statement", "no fields to update");
            return None;
        }

        let set = fields
            .iter()
            .filter_map(|field| {
                record
                    .get(field)
                    .filter(|v| !v.is_null())
                    .map(|v| (field.clone(), v.clone()))
            })
            .collect();

        Some(UpdateInstruction {
            filter: BTreeMap::from([(id_field.to_string(), id.clone())]),
            set,
            current_date: vec![self.timestamp_field.clone()],
            upsert: true,
            multi: self.multi,
        })
    }
}

/// Build the instruction list for a batch of records.
///
/// Returns `None` when there are no records at all. Records the builder skips
/// are dropped from the list; they never fail the batch, so the result may be
/// `Some(vec![])`.
pub fn build_instructions(
    records: Option<&[RowRecord]>,
    id_field: &str,
    fields: &[String],
    builder: &dyn UpdateBuilder,
) -> Option<Vec<UpdateInstruction>> {
    let records = records.filter(|r| !r.is_empty())?;
    Some(
        records
            .iter()
            .filter_map(|record| builder.build(Some(record), id_field, fields))
            .collect(),
    )
}

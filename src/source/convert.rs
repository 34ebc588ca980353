//! Arrow arrays → [`Value`] columns.

use crate::batch::RowBatch;
use crate::schema::{FieldType, Schema};
use crate::value::Value;
use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Date64Type, Float16Type, Float32Type, Float64Type,
    Int8Type, Int16Type, Int32Type, Int64Type, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type,
    UInt16Type, UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatch;
use tracing::debug;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Whether a file column of type `actual` can feed a schema field of `expected`.
pub(crate) fn accepts(expected: FieldType, actual: &DataType) -> bool {
    match (expected, actual) {
        (_, DataType::Null) => true,
        (FieldType::Utf8, DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View) => true,
        (FieldType::Utf8, DataType::Dictionary(_, value)) => {
            matches!(value.as_ref(), DataType::Utf8 | DataType::LargeUtf8)
        }
        (FieldType::Int64 | FieldType::Float64, t) if t.is_integer() => true,
        (FieldType::Float64, t) if t.is_floating() => true,
        (FieldType::Boolean, DataType::Boolean) => true,
        (FieldType::Timestamp, DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64) => {
            true
        }
        _ => false,
    }
}

/// Project a record batch onto `schema`, in schema order.
///
/// A schema field missing from the batch becomes an all-null column.
pub(crate) fn to_row_batch(batch: &RecordBatch, schema: &Schema) -> RowBatch {
    let rows = batch.num_rows();
    RowBatch::new(
        schema
            .fields()
            .iter()
            .map(|field| {
                let values = batch
                    .column_by_name(&field.name)
                    .map_or_else(|| vec![Value::Null; rows], |c| array_values(c.as_ref()));
                (field.name.clone(), values)
            })
            .collect(),
    )
}

fn primitive<T, F>(array: &dyn Array, f: F) -> Vec<Value>
where
    T: ArrowPrimitiveType,
    F: Fn(T::Native) -> Value,
{
    array
        .as_primitive::<T>()
        .iter()
        .map(|v| v.map_or(Value::Null, &f))
        .collect()
}

/// Convert one Arrow array to values, nulls preserved.
pub(crate) fn array_values(array: &dyn Array) -> Vec<Value> {
    match array.data_type() {
        DataType::Null => vec![Value::Null; array.len()],
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
        DataType::Int8 => primitive::<Int8Type, _>(array, |v| Value::Int(i64::from(v))),
        DataType::Int16 => primitive::<Int16Type, _>(array, |v| Value::Int(i64::from(v))),
        DataType::Int32 => primitive::<Int32Type, _>(array, |v| Value::Int(i64::from(v))),
        DataType::Int64 => primitive::<Int64Type, _>(array, Value::Int),
        DataType::UInt8 => primitive::<UInt8Type, _>(array, |v| Value::Int(i64::from(v))),
        DataType::UInt16 => primitive::<UInt16Type, _>(array, |v| Value::Int(i64::from(v))),
        DataType::UInt32 => primitive::<UInt32Type, _>(array, |v| Value::Int(i64::from(v))),
        DataType::UInt64 => primitive::<UInt64Type, _>(array, Value::UInt),
        DataType::Float16 => primitive::<Float16Type, _>(array, |v| Value::Float(v.to_f64())),
        DataType::Float32 => primitive::<Float32Type, _>(array, |v| Value::Float(f64::from(v))),
        DataType::Float64 => primitive::<Float64Type, _>(array, Value::Float),
        DataType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect(),
        DataType::LargeUtf8 => array
            .as_string::<i64>()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect(),
        DataType::Utf8View => array
            .as_string_view()
            .iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect(),
        DataType::Timestamp(unit, _) => match unit {
            TimeUnit::Second => {
                primitive::<TimestampSecondType, _>(array, |v| Value::Timestamp(v.saturating_mul(1_000)))
            }
            TimeUnit::Millisecond => {
                primitive::<TimestampMillisecondType, _>(array, Value::Timestamp)
            }
            TimeUnit::Microsecond => {
                primitive::<TimestampMicrosecondType, _>(array, |v| Value::Timestamp(v / 1_000))
            }
            TimeUnit::Nanosecond => primitive::<TimestampNanosecondType, _>(array, |v| {
                Value::Timestamp(v / 1_000_000)
            }),
        },
        DataType::Date32 => primitive::<Date32Type, _>(array, |v| {
            Value::Timestamp(i64::from(v).saturating_mul(MILLIS_PER_DAY))
        }),
        DataType::Date64 => primitive::<Date64Type, _>(array, Value::Timestamp),
        DataType::Dictionary(_, value_type) => match cast(array, value_type) {
            Ok(decoded) => array_values(decoded.as_ref()),
            Err(error) => {
                debug!(%error, "cannot decode dictionary column; reading it as nulls");
                vec![Value::Null; array.len()]
            }
        },
        other => {
            debug!(data_type = %other, "unsupported column type; reading it as nulls");
            vec![Value::Null; array.len()]
        }
    }
}

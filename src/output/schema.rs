//! Table ↔ Arrow conversion
//!
//! Provides the mapping from normalized tables to Arrow RecordBatches,
//! and from Arrow back to JSON records for inspection.

use crate::normalize::{CellValue, ColumnType, Table};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Arrow type for a column type
///
/// Columns that never saw a value are stored as nullable strings.
pub fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Null | ColumnType::Text => DataType::Utf8,
        ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
    }
}

/// Arrow schema of a table; every field is nullable
pub fn table_schema(table: &Table) -> Schema {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|c| Field::new(&c.name, arrow_type(c.column_type), true))
        .collect();
    Schema::new(fields)
}

/// Convert a table into a single RecordBatch
pub fn table_to_arrow(table: &Table) -> Result<RecordBatch, ArrowError> {
    let schema = Arc::new(table_schema(table));

    if table.columns().is_empty() {
        return Err(ArrowError::SchemaError(format!(
            "table '{}' has no columns",
            table.name()
        )));
    }

    let columns: Vec<ArrayRef> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let values: Vec<&CellValue> = table.rows().iter().map(|row| &row[idx]).collect();
            build_array(&values, column.column_type)
        })
        .collect();

    RecordBatch::try_new(schema, columns)
}

/// Build an Arrow array for one column
///
/// Cells are coerced to the reconciled column type; cells that cannot be
/// represented become null.
fn build_array(values: &[&CellValue], column_type: ColumnType) -> ArrayRef {
    match column_type {
        ColumnType::Bool => {
            let arr: BooleanArray = values
                .iter()
                .map(|v| match v {
                    CellValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Arc::new(arr)
        }

        ColumnType::Int => {
            let arr: Int64Array = values.iter().map(|v| v.as_i64()).collect();
            Arc::new(arr)
        }

        ColumnType::Float => {
            let arr: Float64Array = values.iter().map(|v| v.as_f64()).collect();
            Arc::new(arr)
        }

        ColumnType::Null | ColumnType::Text => {
            let arr: StringArray = values.iter().map(|v| v.to_text()).collect();
            Arc::new(arr)
        }

        ColumnType::Timestamp => {
            let arr: TimestampMicrosecondArray = values
                .iter()
                .map(|v| v.as_timestamp().map(|ts| ts.timestamp_micros()))
                .collect();
            Arc::new(arr.with_timezone("UTC"))
        }
    }
}

/// Convert an Arrow RecordBatch to JSON records
///
/// Returns a vector of JSON objects, one per row in the batch. Timestamps
/// are rendered as RFC 3339 strings.
pub fn arrow_to_json(batch: &RecordBatch) -> Vec<Value> {
    let schema = batch.schema();
    let num_rows = batch.num_rows();
    let mut records = Vec::with_capacity(num_rows);

    for row_idx in 0..num_rows {
        let mut record = serde_json::Map::new();

        for (col_idx, field) in schema.fields().iter().enumerate() {
            let column = batch.column(col_idx);
            record.insert(field.name().clone(), array_value_to_json(column.as_ref(), row_idx));
        }

        records.push(Value::Object(record));
    }

    records
}

/// Convert a single array element to JSON
fn array_value_to_json(array: &dyn Array, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }

    let any = array.as_any();
    match array.data_type() {
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(Value::Null, |arr| Value::Bool(arr.value(row))),

        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(Value::Null, |arr| Value::Number(arr.value(row).into())),

        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .and_then(|arr| serde_json::Number::from_f64(arr.value(row)))
            .map_or(Value::Null, Value::Number),

        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map_or(Value::Null, |arr| Value::String(arr.value(row).to_string())),

        DataType::Timestamp(TimeUnit::Microsecond, _) => any
            .downcast_ref::<TimestampMicrosecondArray>()
            .and_then(|arr| DateTime::<Utc>::from_timestamp_micros(arr.value(row)))
            .map_or(Value::Null, |ts| Value::String(ts.to_rfc3339())),

        // Snapshots only hold the types above
        other => Value::String(format!("<{other}>")),
    }
}

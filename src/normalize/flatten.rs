//! Nested JSON → flat row
//!
//! Keys of nested objects are joined to their parent key with
//! [`SEPARATOR`]. Top-level keys sit at level 0 and an object found at a
//! level below `max_level` is expanded into its children; anything deeper,
//! and every array, is kept whole as compact JSON text.
//!
//! A flattened name can clash with a key already in the row (`rating_rate`
//! next to `rating: {rate}`). The later value wins, keeps the earlier
//! position, and the clash is logged.

use super::types::{CellValue, Row};
use crate::types::{JsonObject, JsonValue};
use tracing::warn;

/// Joins nested key segments
pub const SEPARATOR: &str = "_";

/// Flatten one object into a row, preserving key order
pub fn flatten_record(record: &JsonObject, max_level: usize) -> Row {
    let mut row = Row::new();
    flatten_into(record, None, 0, max_level, &mut row);
    row
}

fn flatten_into(
    object: &JsonObject,
    prefix: Option<&str>,
    level: usize,
    max_level: usize,
    row: &mut Row,
) {
    for (key, value) in object {
        let name = match prefix {
            Some(prefix) => format!("{prefix}{SEPARATOR}{key}"),
            None => key.clone(),
        };
        match value {
            JsonValue::Object(nested) if level < max_level => {
                flatten_into(nested, Some(&name), level + 1, max_level, row);
            }
            other => put(row, name, json_to_cell(other)),
        }
    }
}

fn put(row: &mut Row, name: String, cell: CellValue) {
    match row.iter_mut().find(|(existing, _)| *existing == name) {
        Some((_, slot)) => {
            warn!(
                column = %name,
                dropped = ?slot,
                kept = ?cell,
                "Flattened column name collision"
            );
            *slot = cell;
        }
        None => row.push((name, cell)),
    }
}

/// Convert a JSON value to a cell
pub fn json_to_cell(value: &JsonValue) -> CellValue {
    match value {
        JsonValue::Null => CellValue::Null,
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            // u64 beyond i64 range and real numbers
            None => n.as_f64().map_or(CellValue::Null, CellValue::Float),
        },
        JsonValue::String(s) => CellValue::Text(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => CellValue::Text(value.to_string()),
    }
}

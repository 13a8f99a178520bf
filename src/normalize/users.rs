//! `users` table

use super::flatten::flatten_record;
use super::types::{CellValue, ColumnType, Table};
use super::{expect_object, validate_shape, EXTRACTED_AT};
use crate::error::Result;
use crate::types::RawRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Table name
pub const USERS: &str = "users";

/// Nesting levels expanded (`address_geolocation_lat`, `name_firstname`)
pub const USER_MAX_LEVEL: usize = 3;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct UserShape {
    id: serde_json::Number,
}

/// Flatten user records
///
/// Fails if any record is not an object with a numeric `id`.
pub fn normalize_users(records: Vec<RawRecord>, extracted_at: DateTime<Utc>) -> Result<Table> {
    let mut table = Table::new(USERS);

    for (idx, record) in records.iter().enumerate() {
        let object = expect_object(USERS, idx, record)?;
        validate_shape::<UserShape>(USERS, idx, record)?;

        let mut row = flatten_record(object, USER_MAX_LEVEL);
        row.push((EXTRACTED_AT.to_string(), CellValue::Timestamp(extracted_at)));
        table.push_row(row);
    }

    table.ensure_column(EXTRACTED_AT, ColumnType::Timestamp);
    Ok(table)
}

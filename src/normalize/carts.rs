//! `cart_items` table: one row per cart line

use super::types::{CellValue, ColumnType, Table};
use super::{validate_shape, EXTRACTED_AT};
use crate::error::{Error, Result};
use crate::types::RawRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

/// Table name
pub const CART_ITEMS: &str = "cart_items";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartRecord {
    id: i64,
    user_id: i64,
    date: String,
    #[serde(default)]
    products: Option<Vec<CartLine>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLine {
    product_id: i64,
    quantity: i64,
}

/// Explode carts into line items
///
/// Parent `cart_id`, `user_id` and `date` are copied onto every line. A
/// cart without products contributes no rows.
pub fn normalize_carts(records: Vec<RawRecord>, extracted_at: DateTime<Utc>) -> Result<Table> {
    let mut table = Table::with_columns(
        CART_ITEMS,
        &[
            ("cart_id", ColumnType::Int),
            ("user_id", ColumnType::Int),
            ("date", ColumnType::Timestamp),
            ("product_id", ColumnType::Int),
            ("quantity", ColumnType::Int),
            (EXTRACTED_AT, ColumnType::Timestamp),
        ],
    );

    for (idx, record) in records.iter().enumerate() {
        let cart: CartRecord = validate_shape(CART_ITEMS, idx, record)?;
        let date = parse_timestamp(&cart.date).ok_or_else(|| {
            Error::schema(
                CART_ITEMS,
                format!("record {idx}: cart {} has unparsable date '{}'", cart.id, cart.date),
            )
        })?;

        for line in cart.products.unwrap_or_default() {
            table.push_row(vec![
                ("cart_id".to_string(), CellValue::Int(cart.id)),
                ("user_id".to_string(), CellValue::Int(cart.user_id)),
                ("date".to_string(), CellValue::Timestamp(date)),
                ("product_id".to_string(), CellValue::Int(line.product_id)),
                ("quantity".to_string(), CellValue::Int(line.quantity)),
                (EXTRACTED_AT.to_string(), CellValue::Timestamp(extracted_at)),
            ]);
        }
    }

    Ok(table)
}

/// Parse a source date into UTC
///
/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC)
/// and a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

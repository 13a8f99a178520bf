//! `products` table

use super::flatten::flatten_record;
use super::types::{CellValue, ColumnType, Table};
use super::{expect_object, validate_shape, EXTRACTED_AT};
use crate::error::Result;
use crate::types::RawRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Table name
pub const PRODUCTS: &str = "products";

/// Value of the `source` column
pub const SOURCE_TAG: &str = "fakestore_api";

/// Nesting levels expanded (`rating` → `rating_rate`, `rating_count`)
pub const PRODUCT_MAX_LEVEL: usize = 2;

/// Minimum shape every product must have
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct ProductShape {
    id: serde_json::Number,
    price: f64,
}

/// Flatten product records
///
/// Fails if any record lacks a numeric `id` or `price`.
pub fn normalize_products(records: Vec<RawRecord>, extracted_at: DateTime<Utc>) -> Result<Table> {
    let mut table = Table::new(PRODUCTS);

    for (idx, record) in records.iter().enumerate() {
        let object = expect_object(PRODUCTS, idx, record)?;
        validate_shape::<ProductShape>(PRODUCTS, idx, record)?;

        let mut row = flatten_record(object, PRODUCT_MAX_LEVEL);
        row.push((EXTRACTED_AT.to_string(), CellValue::Timestamp(extracted_at)));
        row.push(("source".to_string(), CellValue::from(SOURCE_TAG)));
        table.push_row(row);
    }

    table.ensure_column(EXTRACTED_AT, ColumnType::Timestamp);
    table.ensure_column("source", ColumnType::Text);
    Ok(table)
}

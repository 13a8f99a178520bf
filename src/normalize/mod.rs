//! Normalization module
//!
//! Turns raw source records into flat tables.
//!
//! # Overview
//!
//! | Entity     | Table        | Rule                                           |
//! |------------|--------------|------------------------------------------------|
//! | products   | `products`   | flatten 2 levels, add `extracted_at`, `source` |
//! | categories | `categories` | per-category price statistics                  |
//! | users      | `users`      | flatten 3 levels, add `extracted_at`           |
//! | carts      | `cart_items` | one row per cart line, add `extracted_at`      |
//!
//! Each record is checked against the minimum shape its table needs before
//! it is flattened; a violation is a schema error for the whole batch.

mod carts;
mod categories;
mod flatten;
mod products;
mod types;
mod users;

pub use carts::{normalize_carts, parse_timestamp, CART_ITEMS};
pub use categories::{category_products_segments, normalize_categories, CategoryStats, CATEGORIES};
pub use flatten::{flatten_record, json_to_cell, SEPARATOR};
pub use products::{normalize_products, PRODUCTS, PRODUCT_MAX_LEVEL, SOURCE_TAG};
pub use types::{CellValue, Column, ColumnType, Row, Table};
pub use users::{normalize_users, USERS, USER_MAX_LEVEL};

use crate::error::{Error, Result};
use crate::http::{json_type_name, Fetcher};
use crate::types::{Entity, JsonObject, RawRecord};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

/// Ingestion timestamp column present in every table
pub const EXTRACTED_AT: &str = "extracted_at";

/// Normalize the raw records of one entity
///
/// Only categories needs `fetcher`, for its per-category product lookups.
pub async fn normalize_entity(
    entity: Entity,
    records: Vec<RawRecord>,
    fetcher: &dyn Fetcher,
    extracted_at: DateTime<Utc>,
) -> Result<Table> {
    match entity {
        Entity::Products => normalize_products(records, extracted_at),
        Entity::Categories => normalize_categories(records, fetcher, extracted_at).await,
        Entity::Users => normalize_users(records, extracted_at),
        Entity::Carts => normalize_carts(records, extracted_at),
    }
}

pub(crate) fn expect_object<'a>(
    table: &str,
    idx: usize,
    record: &'a RawRecord,
) -> Result<&'a JsonObject> {
    record.as_object().ok_or_else(|| {
        Error::schema(
            table,
            format!("record {idx}: expected an object, got {}", json_type_name(record)),
        )
    })
}

pub(crate) fn validate_shape<T: DeserializeOwned>(
    table: &str,
    idx: usize,
    record: &RawRecord,
) -> Result<T> {
    T::deserialize(record).map_err(|e| Error::schema(table, format!("record {idx}: {e}")))
}

//! `categories` table: one row of price statistics per category

use super::types::{CellValue, ColumnType, Table};
use super::{validate_shape, EXTRACTED_AT};
use crate::error::{Error, Result};
use crate::http::{json_type_name, Fetcher};
use crate::types::{JsonValue, RawRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

/// Table name
pub const CATEGORIES: &str = "categories";

#[derive(Debug, Deserialize)]
struct PricedProduct {
    price: f64,
}

/// Price statistics for one category
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CategoryStats {
    pub product_count: usize,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl CategoryStats {
    /// Aggregate a list of prices; empty input has no price statistics
    #[allow(clippy::cast_precision_loss)]
    pub fn from_prices(prices: &[f64]) -> Self {
        if prices.is_empty() {
            return Self::default();
        }
        let sum: f64 = prices.iter().sum();
        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            product_count: prices.len(),
            avg_price: Some(sum / prices.len() as f64),
            min_price: Some(min),
            max_price: Some(max),
        }
    }
}

/// Source path segments listing the products of one category
///
/// The name is always a single segment, whatever characters it holds.
pub fn category_products_segments(category: &str) -> [&str; 3] {
    ["products", "category", category]
}

/// Build the categories table
///
/// `names` is the raw category listing. Each distinct name costs one more
/// request through `fetcher` for its products.
pub async fn normalize_categories(
    names: Vec<RawRecord>,
    fetcher: &dyn Fetcher,
    extracted_at: DateTime<Utc>,
) -> Result<Table> {
    let mut table = Table::with_columns(
        CATEGORIES,
        &[
            ("category", ColumnType::Text),
            ("product_count", ColumnType::Int),
            ("avg_price", ColumnType::Float),
            ("min_price", ColumnType::Float),
            ("max_price", ColumnType::Float),
            (EXTRACTED_AT, ColumnType::Timestamp),
        ],
    );

    for category in distinct_names(names)? {
        let payload = fetcher
            .fetch_one(&category_products_segments(&category))
            .await?;
        let prices = product_prices(&category, &payload)?;
        let stats = CategoryStats::from_prices(&prices);
        debug!(category = %category, products = stats.product_count, "Aggregated category");

        table.push_row(vec![
            ("category".to_string(), CellValue::Text(category)),
            (
                "product_count".to_string(),
                CellValue::Int(stats.product_count as i64),
            ),
            ("avg_price".to_string(), stats.avg_price.into()),
            ("min_price".to_string(), stats.min_price.into()),
            ("max_price".to_string(), stats.max_price.into()),
            (EXTRACTED_AT.to_string(), CellValue::Timestamp(extracted_at)),
        ]);
    }

    Ok(table)
}

/// Category names in first-seen order, without duplicates
fn distinct_names(names: Vec<RawRecord>) -> Result<Vec<String>> {
    let mut distinct: Vec<String> = Vec::with_capacity(names.len());
    for (idx, name) in names.into_iter().enumerate() {
        match name {
            JsonValue::String(name) => {
                if !distinct.contains(&name) {
                    distinct.push(name);
                }
            }
            other => {
                return Err(Error::schema(
                    CATEGORIES,
                    format!(
                        "record {idx}: expected a category name, got {}",
                        json_type_name(&other)
                    ),
                ))
            }
        }
    }
    Ok(distinct)
}

fn product_prices(category: &str, payload: &JsonValue) -> Result<Vec<f64>> {
    let JsonValue::Array(products) = payload else {
        return Err(Error::schema(
            CATEGORIES,
            format!(
                "products of '{category}': expected an array, got {}",
                json_type_name(payload)
            ),
        ));
    };

    products
        .iter()
        .enumerate()
        .map(|(idx, product)| {
            validate_shape::<PricedProduct>(CATEGORIES, idx, product)
                .map(|p| p.price)
                .map_err(|e| match e {
                    Error::Schema { table, message } => Error::Schema {
                        table,
                        message: format!("products of '{category}', {message}"),
                    },
                    other => other,
                })
        })
        .collect()
}

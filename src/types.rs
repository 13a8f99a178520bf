//! Common types used throughout catalog-etl
//!
//! This module contains shared type definitions and type aliases
//! used across multiple modules.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// A record exactly as the source returned it
pub type RawRecord = JsonValue;

// ============================================================================
// Entities
// ============================================================================

/// The catalog collections extracted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Products,
    Categories,
    Users,
    Carts,
}

impl Entity {
    /// All entities, in the order a run processes them
    pub const ALL: [Entity; 4] = [
        Entity::Products,
        Entity::Categories,
        Entity::Users,
        Entity::Carts,
    ];

    /// Source path listing this entity
    pub fn path(self) -> &'static str {
        match self {
            Entity::Products => "products",
            Entity::Categories => "products/categories",
            Entity::Users => "users",
            Entity::Carts => "carts",
        }
    }

    /// Name of the table this entity is persisted as
    pub fn table_name(self) -> &'static str {
        match self {
            Entity::Products => "products",
            Entity::Categories => "categories",
            Entity::Users => "users",
            Entity::Carts => "cart_items",
        }
    }

    /// Whether the list endpoint accepts a `limit` query parameter
    pub fn supports_limit(self) -> bool {
        !matches!(self, Entity::Categories)
    }

    fn as_str(self) -> &'static str {
        match self {
            Entity::Products => "products",
            Entity::Categories => "categories",
            Entity::Users => "users",
            Entity::Carts => "carts",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Entity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "products" => Ok(Entity::Products),
            "categories" => Ok(Entity::Categories),
            "users" => Ok(Entity::Users),
            "carts" | "cart_items" => Ok(Entity::Carts),
            other => Err(Error::invalid_value(
                "entities",
                format!("unknown entity '{other}' (expected products, categories, users or carts)"),
            )),
        }
    }
}

/// Parse a comma-separated entity list, keeping run order and dropping duplicates
pub fn parse_entities(list: &str) -> Result<Vec<Entity>> {
    let mut selected = Vec::new();
    for part in list.split(',').filter(|p| !p.trim().is_empty()) {
        let entity: Entity = part.parse()?;
        if !selected.contains(&entity) {
            selected.push(entity);
        }
    }
    if selected.is_empty() {
        return Err(Error::invalid_value("entities", "no entities selected"));
    }
    selected.sort_by_key(|e| Entity::ALL.iter().position(|a| a == e));
    Ok(selected)
}

// ============================================================================
// Snapshot layout
// ============================================================================

/// Where snapshot files land inside the output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// `{output_dir}/{table}.parquet`
    #[default]
    Flat,
    /// `{output_dir}/{table}/dt={YYYY-MM-DD}/data.parquet`
    Partitioned,
}

// ============================================================================
// Compression
// ============================================================================

/// Parquet compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionType {
    None,
    #[default]
    Snappy,
    Zstd,
    Gzip,
}

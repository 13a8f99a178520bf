//! Tabular types produced by the normalizers

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A single scalar cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    /// Type of this cell
    pub fn column_type(&self) -> ColumnType {
        match self {
            CellValue::Null => ColumnType::Null,
            CellValue::Bool(_) => ColumnType::Bool,
            CellValue::Int(_) => ColumnType::Int,
            CellValue::Float(_) => ColumnType::Float,
            CellValue::Text(_) => ColumnType::Text,
            CellValue::Timestamp(_) => ColumnType::Timestamp,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value, widening integers
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            CellValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Render as text, for columns widened to `Text`
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Int(v) => Some(v.to_string()),
            CellValue::Float(v) => Some(v.to_string()),
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Timestamp(ts) => Some(ts.to_rfc3339()),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

impl From<DateTime<Utc>> for CellValue {
    fn from(v: DateTime<Utc>) -> Self {
        CellValue::Timestamp(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(CellValue::Null, Into::into)
    }
}

/// Logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// No non-null value seen yet
    Null,
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
}

impl ColumnType {
    /// Widen two types to one both fit in
    pub fn merge(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnType::Null, other) | (other, ColumnType::Null) => other,
            (ColumnType::Int, ColumnType::Float) | (ColumnType::Float, ColumnType::Int) => {
                ColumnType::Float
            }
            _ => ColumnType::Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Null => "null",
            ColumnType::Bool => "bool",
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Text => "text",
            ColumnType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// One row before it is aligned to a table: columns in record order
pub type Row = Vec<(String, CellValue)>;

/// Rows sharing one reconciled schema
///
/// Every stored row has exactly one cell per column; cells for columns a
/// record did not have are `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    rows: Vec<Vec<CellValue>>,
    index: HashMap<String, usize>,
}

impl Table {
    /// Create an empty table
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create a table with its columns declared up front
    pub fn with_columns(name: impl Into<String>, columns: &[(&str, ColumnType)]) -> Self {
        let mut table = Self::new(name);
        for (column, column_type) in columns {
            table.ensure_column(column, *column_type);
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Cell at `row` in the named column
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = *self.index.get(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All cells of the named column, top to bottom
    pub fn column_values(&self, column: &str) -> Option<Vec<&CellValue>> {
        let idx = *self.index.get(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Declare a column if it does not exist yet, widening its type if it does
    pub fn ensure_column(&mut self, name: &str, column_type: ColumnType) -> usize {
        if let Some(&idx) = self.index.get(name) {
            let column = &mut self.columns[idx];
            column.column_type = column.column_type.merge(column_type);
            return idx;
        }
        let idx = self.columns.len();
        self.columns.push(Column {
            name: name.to_string(),
            column_type,
        });
        self.index.insert(name.to_string(), idx);
        for row in &mut self.rows {
            row.push(CellValue::Null);
        }
        idx
    }

    /// Append a row, adding any columns seen for the first time
    pub fn push_row(&mut self, row: Row) {
        let mut cells = vec![CellValue::Null; self.columns.len()];
        for (name, value) in row {
            let idx = self.ensure_column(&name, value.column_type());
            if idx >= cells.len() {
                cells.resize(idx + 1, CellValue::Null);
            }
            cells[idx] = value;
        }
        cells.resize(self.columns.len(), CellValue::Null);
        self.rows.push(cells);
    }
}

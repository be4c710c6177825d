//! Domain models for the shipment grouping pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`CellValue`] - Raw spreadsheet cell, tagged once at load time
//! - [`RawTable`] - Rectangular table of raw cells with column names
//! - [`ColumnPlan`] - Key/detail partition of the table's columns
//! - [`DetailRecord`] - Ordered output record of one row's detail fields

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};

// =============================================================================
// Raw Cells
// =============================================================================

/// A raw cell value as read from the source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Missing or blank cell.
    Empty,
    /// Text, including numbers stored as text.
    Text(String),
    /// Native date/time cell.
    Date(NaiveDateTime),
    /// Native numeric cell.
    Number(f64),
}

impl CellValue {
    /// Build a text cell, mapping blank strings to [`CellValue::Empty`].
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

// =============================================================================
// Table
// =============================================================================

/// A rectangular table of raw cells.
///
/// Every row has exactly `columns.len()` cells and no row is entirely empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Column names, unique, in sheet order.
    pub columns: Vec<String>,
    /// Data rows.
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Build a table, padding short rows and dropping rows with no data.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .filter(|row| !row.iter().all(CellValue::is_empty))
            .collect();
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Column Plan
// =============================================================================

/// A column participating in the group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    pub name: String,
    /// Position in the source table.
    pub index: usize,
}

/// A column carried into detail records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailColumn {
    pub name: String,
    /// Name used in the output (after rename).
    pub output_name: String,
    /// Position in the source table.
    pub index: usize,
}

/// Key/detail partition of a table's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    /// Key columns in canonical rank order.
    pub keys: Vec<KeyColumn>,
    /// Detail columns in table order.
    pub details: Vec<DetailColumn>,
}

impl ColumnPlan {
    pub fn key_names(&self) -> Vec<String> {
        self.keys.iter().map(|k| k.name.clone()).collect()
    }

    /// Output headers of the detail columns, duplicates kept.
    pub fn detail_headers(&self) -> Vec<String> {
        self.details.iter().map(|d| d.output_name.clone()).collect()
    }
}

// =============================================================================
// Detail Records
// =============================================================================

/// One row's detail fields, keyed by output name in column order.
///
/// Values are JSON strings, integers or floats.
pub type DetailRecord = Map<String, Value>;

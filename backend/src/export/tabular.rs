//! Tabular rendering of grouped rows.
//!
//! Produces a sheet model: a grid of cells, vertical merge regions for the
//! sequence and key columns of every multi-row group, and the cells that
//! must be centered. Writing the model to a file is [`super::xlsx`]'s job.
//!
//! ```text
//! 序号 │ 日期       │ 运单号 │ 费用
//! ─────┼────────────┼────────┼─────
//!      │            │        │ 10.0
//!  1   │ 2025-09-01 │ A1     ├─────
//!      │            │        │ 5.0
//! ─────┼────────────┼────────┼─────
//!  2   │ 2025-01-02 │ B2     │ 3.5
//! ```

use serde_json::Value;

use crate::config::SEQUENCE_HEADER;
use crate::transform::grouper::GroupedRows;

/// One output cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Empty,
    Text(String),
    Number(f64),
}

impl From<&Value> for SheetCell {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SheetCell::Empty,
            Value::String(s) if s.is_empty() => SheetCell::Empty,
            Value::String(s) => SheetCell::Text(s.clone()),
            Value::Number(n) => n
                .as_f64()
                .map(SheetCell::Number)
                .unwrap_or_else(|| SheetCell::Text(n.to_string())),
            Value::Bool(b) => SheetCell::Text(b.to_string()),
            other => SheetCell::Text(other.to_string()),
        }
    }
}

/// A vertical merge over rows `first_row..=last_row` of one column (0-based, header is row 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRegion {
    pub first_row: usize,
    pub last_row: usize,
    pub col: usize,
}

/// Grid, merges and alignment of the tabular output.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularSheet {
    pub headers: Vec<String>,
    /// Data rows; sheet row `i + 1`.
    pub rows: Vec<Vec<SheetCell>>,
    pub merges: Vec<MergeRegion>,
    /// Cells centered horizontally and vertically, as (sheet row, column).
    pub centered: Vec<(usize, usize)>,
}

impl TabularSheet {
    /// Merge region starting at the given cell, if any.
    pub fn merge_at(&self, row: usize, col: usize) -> Option<&MergeRegion> {
        self.merges
            .iter()
            .find(|m| m.first_row == row && m.col == col)
    }

    /// True when the cell is inside a merge region but not its first cell.
    pub fn is_merged_tail(&self, row: usize, col: usize) -> bool {
        self.merges
            .iter()
            .any(|m| m.col == col && row > m.first_row && row <= m.last_row)
    }

    pub fn is_centered(&self, row: usize, col: usize) -> bool {
        self.centered.contains(&(row, col))
    }
}

/// Render the grouped rows as one sheet with a leading sequence column.
pub fn render(grouped: &GroupedRows) -> TabularSheet {
    let key_count = grouped.key_columns.len();

    let mut headers = Vec::with_capacity(1 + key_count + grouped.detail_headers.len());
    headers.push(SEQUENCE_HEADER.to_string());
    headers.extend(grouped.key_columns.iter().cloned());
    headers.extend(grouped.detail_headers.iter().cloned());

    let mut rows = Vec::with_capacity(grouped.record_count());
    let mut merges = Vec::new();
    let mut centered = Vec::new();

    for (group_idx, group) in grouped.groups().iter().enumerate() {
        let sequence = (group_idx + 1) as f64;
        let start_row = rows.len() + 1;

        for record in &group.records {
            let mut row = Vec::with_capacity(headers.len());
            row.push(SheetCell::Number(sequence));
            row.extend(group.key.iter().map(|v| {
                if v.is_empty() {
                    SheetCell::Empty
                } else {
                    SheetCell::Text(v.clone())
                }
            }));
            row.extend(
                grouped
                    .detail_headers
                    .iter()
                    .map(|h| record.get(h).map(SheetCell::from).unwrap_or(SheetCell::Empty)),
            );
            rows.push(row);
        }

        let end_row = rows.len();
        for col in 0..=key_count {
            if end_row > start_row {
                merges.push(MergeRegion {
                    first_row: start_row,
                    last_row: end_row,
                    col,
                });
            }
            centered.push((start_row, col));
        }
    }

    TabularSheet {
        headers,
        rows,
        merges,
        centered,
    }
}

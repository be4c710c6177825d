//! # Shipmerge - group shipment spreadsheets by key columns
//!
//! Shipmerge reads a shipment sheet (xlsx or delimited text), normalizes dates
//! and mangled numbers, groups rows by the selected key columns and writes two
//! artifacts: a spreadsheet with merged key cells and a keyed JSON export.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │ Sheet / CSV │────▶│   Parser    │────▶│  Transform  │────▶│ xlsx + JSON  │
//! │ (xlsx, csv) │     │  (auto-enc) │     │ (norm+group)│     │  (exporters) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shipmerge::{run, MergeOptions};
//!
//! let mut options = MergeOptions::new("三月运单.xlsx");
//! options.keys = Some(vec!["日期".into(), "运单号码".into()]);
//! let report = run(&options)?;
//! println!("{} groups", report.group_count);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per stage
//! - [`config`] - Lookup tables and output locations
//! - [`models`] - Cells, tables and column plans
//! - [`parser`] - Workbook and CSV loading
//! - [`transform`] - Normalization, partitioning, grouping and the pipeline
//! - [`export`] - Tabular and keyed outputs
//! - [`validation`] - Keyed-export schema validation
//! - [`logs`] - Progress log broadcasting

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod export;
pub mod validation;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExportError,
    LoadError,
    PipelineError,
    PipelineResult,
    ValidationError,
};

// =============================================================================
// Re-exports - Config & Models
// =============================================================================

pub use config::{resolve_json_dir, MergeConfig};

pub use models::{
    CellValue,
    ColumnPlan,
    DetailColumn,
    DetailRecord,
    KeyColumn,
    RawTable,
};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use parser::{
    list_sheets,
    load_table,
    detect_encoding,
    detect_delimiter,
    decode_content,
    LoadOptions,
    LoadedTable,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    default_selection,
    group_rows,
    normalize,
    normalize_table,
    partition_columns,
    Group,
    GroupedRows,
    NormalizedTable,
};

pub use transform::pipeline::{
    default_output_path,
    preview,
    run,
    run_loaded,
    MergeOptions,
    MergeReport,
    TablePreview,
};

// =============================================================================
// Re-exports - Export & Validation
// =============================================================================

pub use export::{render, render_xlsx, serialize, to_pretty_json, TabularSheet};

pub use validation::{is_valid_keyed_export, validate_keyed_export};

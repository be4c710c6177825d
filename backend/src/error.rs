//! Error types for the shipment grouping pipeline.
//!
//! This module defines one error type per pipeline layer:
//!
//! - [`LoadError`] - Reading the source workbook or CSV file
//! - [`ValidationError`] - Operator input rejected before any work is done
//! - [`ExportError`] - Rendering or writing the two output artifacts
//! - [`PipelineError`] - Top-level orchestration errors, tagged with the failing stage
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Coercion failures (dates that do not parse, numbers that overflow) are not
//! errors at all: the normalizer and grouper recover locally by keeping the
//! original text.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Load Errors
// =============================================================================

/// Errors while loading the source table.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Workbook could not be opened or decoded.
    #[error("Failed to open workbook '{path}': {message}")]
    Workbook { path: PathBuf, message: String },

    /// Extension is neither a workbook nor delimited text.
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Sheet name not present in the workbook.
    #[error("Sheet '{name}' not found (available: {available})")]
    SheetNotFound { name: String, available: String },

    /// Sheet has no cells at all.
    #[error("Sheet '{0}' is empty")]
    EmptySheet(String),

    /// Header row lies below the last row holding data.
    #[error("Header row {row} is beyond the last data row ({last})")]
    HeaderRowOutOfRange { row: usize, last: usize },

    /// Delimited text could not be decoded or parsed.
    #[error("Invalid CSV: {0}")]
    Csv(String),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Operator input rejected before anything is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// No key column selected.
    #[error("Select at least one key column to group by")]
    NoKeyColumns,

    /// A selected key column does not exist in the table.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Header row numbers are 1-based.
    #[error("Header row must be 1 or greater, got {0}")]
    InvalidHeaderRow(usize),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while rendering or writing the output artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Spreadsheet rendering failed.
    #[error("Excel error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Keyed export does not match the embedded schema.
    #[error("Keyed export failed schema validation: {errors:?}")]
    Schema { errors: Vec<String> },

    /// Output directory or file could not be written.
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::run`].
/// Each variant names the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading the source table failed.
    #[error("load: {0}")]
    Load(#[from] LoadError),

    /// Operator input was rejected.
    #[error("validate: {0}")]
    Validation(#[from] ValidationError),

    /// Writing outputs failed.
    #[error("export: {0}")]
    Export(#[from] ExportError),

    /// Configuration file could not be used.
    #[error("config: {0}")]
    Config(String),
}

impl PipelineError {
    /// True when the run stopped on operator input rather than a runtime failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // LoadError -> PipelineError
        let load_err = LoadError::EmptySheet("Sheet1".into());
        let pipeline_err: PipelineError = load_err.into();
        assert!(pipeline_err.to_string().starts_with("load:"));
        assert!(pipeline_err.to_string().contains("Sheet1"));

        // ValidationError -> PipelineError
        let pipeline_err: PipelineError = ValidationError::NoKeyColumns.into();
        assert!(pipeline_err.is_validation());
        assert!(pipeline_err.to_string().starts_with("validate:"));
    }

    #[test]
    fn test_sheet_not_found_format() {
        let err = LoadError::SheetNotFound {
            name: "Data".into(),
            available: "Sheet1, Sheet2".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'Data'"));
        assert!(msg.contains("Sheet1, Sheet2"));
    }

    #[test]
    fn test_export_error_is_not_validation() {
        let err: PipelineError = ExportError::Schema { errors: vec!["bad".into()] }.into();
        assert!(!err.is_validation());
        assert!(err.to_string().contains("export:"));
    }
}

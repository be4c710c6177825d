//! JSON Schema validation of the keyed export.
//!
//! The keyed export is checked against an embedded Draft 7 schema before any
//! file is written, so a malformed structure never reaches disk.
//!
//! # Embedded Schemas
//!
//! Schemas are embedded at compile time from `schemas/` directory:
//! - `keyed-export.json` - object of non-empty arrays of flat records whose
//!   values are strings or numbers
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use shipmerge::validation::validate_keyed_export;
//!
//! let export = json!({ "2025-09-01_A1": [{ "费用": 10.0 }] });
//! assert!(validate_keyed_export(&export).is_ok());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static KEYED_EXPORT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/keyed-export.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick true/false check.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate against the keyed-export schema.
pub fn validate_keyed_export(data: &Value) -> Result<(), Vec<String>> {
    validate(&KEYED_EXPORT_SCHEMA, data)
}

/// Quick check against the keyed-export schema.
pub fn is_valid_keyed_export(data: &Value) -> bool {
    is_valid(&KEYED_EXPORT_SCHEMA, data)
}

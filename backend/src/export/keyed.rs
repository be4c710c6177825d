//! Keyed JSON export: key string → ordered list of detail records.
//!
//! ```json
//! {
//!     "2025-09-01_A1": [
//!         { "费用": 10.0 },
//!         { "费用": 5.0 }
//!     ]
//! }
//! ```
//!
//! Keys keep first-seen group order. Text is written as UTF-8 without
//! escaping non-ASCII characters, indented by four spaces.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::ExportResult;
use crate::transform::grouper::GroupedRows;

/// Suffix appended to the tabular file stem to name the keyed export.
pub const KEYED_EXPORT_SUFFIX: &str = "_data.json";

/// Build the keyed export from the grouped rows.
///
/// Groups whose key strings collide share one entry, records appended in
/// group order.
pub fn serialize(grouped: &GroupedRows) -> Map<String, Value> {
    let mut out = Map::new();
    for group in grouped.groups() {
        let entry = out
            .entry(group.key_string.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(records) = entry {
            records.extend(group.records.iter().cloned().map(Value::Object));
        }
    }
    out
}

/// Render a JSON value with four-space indentation.
pub fn to_pretty_json(value: &impl Serialize) -> ExportResult<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only ever emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Path of the keyed export for a given tabular output file.
pub fn keyed_export_path(json_dir: &Path, tabular_path: &Path) -> PathBuf {
    let stem = tabular_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    json_dir.join(format!("{}{}", stem, KEYED_EXPORT_SUFFIX))
}

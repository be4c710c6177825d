//! Grouping configuration.
//!
//! The lookup tables that drive the normalizer, partitioner and grouper are
//! gathered in [`MergeConfig`] and passed explicitly into each stage. The
//! defaults reproduce the shipment workbook layout; a JSON file can override
//! any subset of fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Canonical key-column order used for the grouping key.
pub const STANDARD_KEY_COLUMNS: [&str; 10] = [
    "日期",
    "清美出库日期",
    "运单号码",
    "清美系统订单号",
    "寄件地区",
    "到件地区",
    "对方公司名称",
    "箱数",
    "计费重量",
    "产品类型",
];

/// Detail columns renamed in the output (source name, output name).
pub const COLUMN_RENAMES: [(&str, &str); 1] = [("费用(元)", "费用")];

/// Substrings that flag a column as holding dates.
pub const DATE_KEYWORDS: [&str; 4] = ["日期", "时间", "Date", "Time"];

/// Output column names always coerced to floating point.
pub const MONETARY_COLUMNS: [&str; 3] = ["费用", "单票折扣", "应付金额"];

/// Separator used to build the key string of a group.
pub const KEY_SEPARATOR: &str = "_";

/// Plain numbers above this value in date columns are read as day serials.
pub const DATE_SERIAL_THRESHOLD: f64 = 10000.0;

/// Environment variable naming the keyed-export directory.
pub const JSON_DIR_ENV: &str = "SHIPMERGE_JSON_DIR";

/// Keyed-export directory when neither the CLI nor the environment sets one.
pub const DEFAULT_JSON_DIR: &str = "json数据";

/// Header of the leading sequence-number column.
pub const SEQUENCE_HEADER: &str = "序号";

/// Worksheet name of the tabular output.
pub const OUTPUT_SHEET_NAME: &str = "处理结果";

/// Lookup tables for one grouping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeConfig {
    /// Canonical key-column order.
    pub key_order: Vec<String>,
    /// Detail column renames (source name -> output name).
    pub renames: BTreeMap<String, String>,
    /// Column-name substrings marking date columns.
    pub date_keywords: Vec<String>,
    /// Output column names always coerced to float.
    pub monetary_columns: Vec<String>,
    /// Separator joining key values into the key string.
    pub key_separator: String,
    /// Day-serial detection threshold for numeric strings in date columns.
    pub date_serial_threshold: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            key_order: STANDARD_KEY_COLUMNS.iter().map(|s| s.to_string()).collect(),
            renames: COLUMN_RENAMES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            date_keywords: DATE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            monetary_columns: MONETARY_COLUMNS.iter().map(|s| s.to_string()).collect(),
            key_separator: KEY_SEPARATOR.to_string(),
            date_serial_threshold: DATE_SERIAL_THRESHOLD,
        }
    }
}

impl MergeConfig {
    /// Load a configuration file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse a configuration from JSON.
    pub fn from_json(content: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| PipelineError::Config(format!("invalid config: {}", e)))?;
        if config.key_separator.is_empty() {
            return Err(PipelineError::Config("keySeparator must not be empty".to_string()));
        }
        Ok(config)
    }

    /// True if the column name contains any date keyword.
    pub fn is_date_column(&self, column: &str) -> bool {
        self.date_keywords.iter().any(|k| column.contains(k.as_str()))
    }

    /// True if the output column is always coerced to float.
    pub fn is_monetary(&self, output_name: &str) -> bool {
        self.monetary_columns.iter().any(|c| c == output_name)
    }

    /// Output name of a detail column.
    pub fn output_name<'a>(&'a self, column: &'a str) -> &'a str {
        self.renames.get(column).map(String::as_str).unwrap_or(column)
    }

    /// Position of a column in the canonical key order.
    pub fn key_rank(&self, column: &str) -> Option<usize> {
        self.key_order.iter().position(|c| c == column)
    }
}

/// Resolve the keyed-export directory: explicit value, then `.env`/environment, then default.
pub fn resolve_json_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    // Try loading .env file
    let _ = dotenvy::dotenv();

    match env::var(JSON_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_JSON_DIR),
    }
}

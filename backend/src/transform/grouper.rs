//! Group normalized shipment rows by their key columns.
//!
//! This module folds the normalized rows into one ordered list of groups.
//! Each group is identified by the tuple of its key values and also carries
//! the separator-joined key string used by the keyed JSON export, so the two
//! outputs always describe the same partition.
//!
//! # Architecture
//!
//! ```text
//! Normalized rows                          Groups (first-seen order)
//! ┌──────────────────────────────┐        ┌──────────────────────────────┐
//! │ 2025-09-01, A1, 费用 10.0     │        │ (2025-09-01, A1)  2025-09-01_A1 │
//! │ 2025-09-01, A1, 费用 5        │   →    │   [{费用: 10.0}, {费用: 5.0}]   │
//! │ 2025-01-02, B2, 费用 3.5      │        ├──────────────────────────────┤
//! └──────────────────────────────┘        │ (2025-01-02, B2)  2025-01-02_B2 │
//!                                         │   [{费用: 3.5}]                 │
//!                                         └──────────────────────────────┘
//! ```
//!
//! # Detail Values
//!
//! Numeric-looking detail strings are coerced for the JSON output:
//!
//! - `"3.5"` → `3.5`, `"12"` → `12`
//! - monetary columns always become floats: `"5"` → `5.0`
//! - anything else, or anything that fails to convert, stays a string

use serde_json::{json, Value};
use std::collections::HashMap;

use super::normalize::{is_numeric_like, NormalizedTable};
use crate::config::MergeConfig;
use crate::models::{ColumnPlan, DetailRecord};

/// Rows sharing one group key.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Canonical key values, one per key column.
    pub key: Vec<String>,
    /// Key values joined with the configured separator.
    pub key_string: String,
    /// Detail records in row order.
    pub records: Vec<DetailRecord>,
}

/// Result of grouping: groups in first-seen order plus the output headers.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRows {
    pub key_columns: Vec<String>,
    pub detail_headers: Vec<String>,
    groups: Vec<Group>,
}

impl GroupedRows {
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total detail records across all groups.
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(|g| g.records.len()).sum()
    }

    /// Key strings shared by more than one distinct group key.
    ///
    /// Happens only when a key value contains the separator.
    pub fn key_string_collisions(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut collisions = Vec::new();
        for group in &self.groups {
            let count = counts.entry(group.key_string.as_str()).or_insert(0);
            *count += 1;
            if *count == 2 {
                collisions.push(group.key_string.clone());
            }
        }
        collisions
    }
}

/// Group the normalized rows according to the column plan.
pub fn group_rows(
    table: &NormalizedTable,
    plan: &ColumnPlan,
    config: &MergeConfig,
) -> GroupedRows {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();

    for row in &table.rows {
        let key: Vec<String> = plan
            .keys
            .iter()
            .map(|k| row.get(k.index).cloned().unwrap_or_default())
            .collect();

        let mut record = DetailRecord::new();
        for column in &plan.details {
            let raw = row.get(column.index).map(String::as_str).unwrap_or("");
            record.insert(
                column.output_name.clone(),
                coerce_detail_value(raw, &column.output_name, config),
            );
        }

        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                groups.push(Group {
                    key_string: key.join(config.key_separator.as_str()),
                    key: key.clone(),
                    records: Vec::new(),
                });
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].records.push(record);
    }

    GroupedRows {
        key_columns: plan.key_names(),
        detail_headers: plan.detail_headers(),
        groups,
    }
}

/// Convert a canonical detail string to its JSON value.
pub fn coerce_detail_value(value: &str, output_name: &str, config: &MergeConfig) -> Value {
    if !is_numeric_like(value) {
        return json!(value);
    }

    if value.contains('.') || config.is_monetary(output_name) {
        match value.parse::<f64>() {
            Ok(f) if f.is_finite() => json!(f),
            _ => json!(value),
        }
    } else {
        match value.parse::<i64>() {
            Ok(n) => json!(n),
            Err(_) => json!(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::partition::partition_columns;

    fn table(columns: &[&str], rows: &[&[&str]]) -> NormalizedTable {
        NormalizedTable {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn group(t: &NormalizedTable, keys: &[&str]) -> GroupedRows {
        let config = MergeConfig::default();
        let selected: Vec<String> = keys.iter().map(|s| s.to_string()).collect();
        let plan = partition_columns(&t.columns, &selected, &config).unwrap();
        group_rows(t, &plan, &config)
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let t = table(
            &["日期", "运单号", "费用"],
            &[
                &["2025-09-01", "A1", "10"],
                &["2025-01-02", "B2", "3.5"],
                &["2025-09-01", "A1", "5"],
            ],
        );

        let grouped = group(&t, &["日期", "运单号"]);

        assert_eq!(grouped.len(), 2);
        let first = &grouped.groups()[0];
        assert_eq!(first.key, vec!["2025-09-01", "A1"]);
        assert_eq!(first.key_string, "2025-09-01_A1");
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.records[0]["费用"], json!(10.0));
        assert_eq!(first.records[1]["费用"], json!(5.0));
        assert_eq!(grouped.groups()[1].key_string, "2025-01-02_B2");
    }

    #[test]
    fn test_record_count_matches_rows() {
        let t = table(
            &["运单号码", "箱数", "备注"],
            &[&["A", "1", ""], &["B", "2", "x"], &["A", "3", ""], &["C", "", ""]],
        );
        let grouped = group(&t, &["运单号码"]);
        assert_eq!(grouped.record_count(), 4);
        assert_eq!(grouped.len(), 3);
    }

    #[test]
    fn test_key_and_string_partitions_agree() {
        let t = table(
            &["日期", "运单号码", "件数"],
            &[
                &["2025-09-01", "A", "1"],
                &["2025-09-02", "A", "1"],
                &["2025-09-01", "A", "2"],
                &["2025-09-01", "B", "1"],
            ],
        );
        let grouped = group(&t, &["日期", "运单号码"]);

        let mut by_string: HashMap<&str, usize> = HashMap::new();
        for g in grouped.groups() {
            *by_string.entry(g.key_string.as_str()).or_default() += g.records.len();
        }
        assert_eq!(by_string.len(), grouped.len());
        for g in grouped.groups() {
            assert_eq!(by_string[g.key_string.as_str()], g.records.len());
        }
        assert!(grouped.key_string_collisions().is_empty());
    }

    #[test]
    fn test_separator_collision_reported() {
        let t = table(
            &["寄件地区", "到件地区", "箱数"],
            &[&["上海_浦东", "杭州", "1"], &["上海", "浦东_杭州", "2"]],
        );
        let grouped = group(&t, &["寄件地区", "到件地区"]);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.key_string_collisions(), vec!["上海_浦东_杭州".to_string()]);
    }

    #[test]
    fn test_detail_record_keeps_column_order_and_rename() {
        let t = table(&["运单号码", "备注", "费用(元)", "件数"], &[&["A", "fragile", "12", "3"]]);
        let grouped = group(&t, &["运单号码"]);
        let record = &grouped.groups()[0].records[0];

        let keys: Vec<&String> = record.keys().collect();
        assert_eq!(keys, vec!["备注", "费用", "件数"]);
        assert_eq!(record["备注"], json!("fragile"));
        assert_eq!(record["费用"], json!(12.0));
        assert_eq!(record["件数"], json!(3));
        assert_eq!(grouped.detail_headers, vec!["备注", "费用", "件数"]);
    }

    #[test]
    fn test_coercion_rules() {
        let config = MergeConfig::default();
        assert_eq!(coerce_detail_value("12", "件数", &config), json!(12));
        assert!(coerce_detail_value("12", "件数", &config).is_i64());
        assert!(coerce_detail_value("12", "应付金额", &config).is_f64());
        assert_eq!(coerce_detail_value("3.5", "件数", &config), json!(3.5));
        assert_eq!(coerce_detail_value("", "件数", &config), json!(""));
        assert_eq!(coerce_detail_value("-3", "件数", &config), json!("-3"));
        assert_eq!(coerce_detail_value("SF123", "单号", &config), json!("SF123"));
    }

    #[test]
    fn test_overflowing_integer_stays_string() {
        let config = MergeConfig::default();
        let long = "1234567890123456789012345";
        assert_eq!(coerce_detail_value(long, "单号", &config), json!(long));
    }
}

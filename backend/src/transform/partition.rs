//! Key/detail column partitioning.
//!
//! Selected columns become key columns: canonical ones first in canonical
//! order, then any ad-hoc selections in table order. Everything else is a
//! detail column, renamed through the configured rename table.

use std::collections::HashSet;

use crate::config::MergeConfig;
use crate::error::ValidationError;
use crate::models::{ColumnPlan, DetailColumn, KeyColumn};

/// Split `columns` into key and detail columns.
///
/// Fails with [`ValidationError::NoKeyColumns`] when nothing is selected and
/// with [`ValidationError::UnknownColumn`] when a selection is not a column.
pub fn partition_columns(
    columns: &[String],
    selected: &[String],
    config: &MergeConfig,
) -> Result<ColumnPlan, ValidationError> {
    if let Some(unknown) = selected.iter().find(|s| !columns.contains(*s)) {
        return Err(ValidationError::UnknownColumn(unknown.clone()));
    }

    let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();

    let mut keys: Vec<KeyColumn> = config
        .key_order
        .iter()
        .filter(|name| selected.contains(name.as_str()))
        .filter_map(|name| {
            columns.iter().position(|c| c == name).map(|index| KeyColumn {
                name: name.clone(),
                index,
            })
        })
        .collect();

    for (index, name) in columns.iter().enumerate() {
        if selected.contains(name.as_str()) && config.key_rank(name).is_none() {
            keys.push(KeyColumn {
                name: name.clone(),
                index,
            });
        }
    }

    if keys.is_empty() {
        return Err(ValidationError::NoKeyColumns);
    }

    let details = columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !selected.contains(name.as_str()))
        .map(|(index, name)| DetailColumn {
            name: name.clone(),
            output_name: config.output_name(name).to_string(),
            index,
        })
        .collect();

    Ok(ColumnPlan { keys, details })
}

/// Columns pre-selected as keys: canonical key columns present in the table.
pub fn default_selection(columns: &[String], config: &MergeConfig) -> Vec<String> {
    columns
        .iter()
        .filter(|c| config.key_rank(c).is_some())
        .cloned()
        .collect()
}

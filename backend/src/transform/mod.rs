//! Transformation module.
//!
//! This module turns a loaded table into grouped shipment records:
//! - Normalize: raw cells to canonical strings (dates, numeric repairs)
//! - Partition: key vs. detail columns
//! - Grouper: rows grouped by their key values
//! - Pipeline: load, group and export in one run

pub mod grouper;
pub mod normalize;
pub mod partition;
pub mod pipeline;

pub use grouper::{group_rows, Group, GroupedRows};
pub use normalize::{normalize, normalize_table, NormalizedTable};
pub use partition::{default_selection, partition_columns};
pub use pipeline::*;

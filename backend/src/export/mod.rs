//! Output rendering.
//!
//! Both artifacts are rendered from the same [`GroupedRows`](crate::transform::grouper::GroupedRows):
//! - Tabular: sheet model with merged key blocks, written as `.xlsx`
//! - Keyed: key string → detail records, written as JSON

pub mod keyed;
pub mod tabular;
pub mod xlsx;

pub use keyed::{keyed_export_path, serialize, to_pretty_json, KEYED_EXPORT_SUFFIX};
pub use tabular::{render, MergeRegion, SheetCell, TabularSheet};
pub use xlsx::{build_workbook, render_xlsx};

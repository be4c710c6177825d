//! High-level merge pipeline: load, normalize, group, export.
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐   ┌─────────────────┐
//! │ xlsx / csv │──▶│ partition  │──▶│ normalize │──▶│  group   │──▶│ .xlsx  +  .json │
//! │  (loader)  │   │ keys/detail│   │   cells   │   │ by keys  │   │ (both or none)  │
//! └────────────┘   └────────────┘   └───────────┘   └──────────┘   └─────────────────┘
//! ```
//!
//! The key selection is validated before anything is written. Both output
//! artifacts are rendered in memory first; if the second write fails the first
//! file is removed again.
//!
//! # Example
//!
//! ```rust,ignore
//! use shipmerge::transform::pipeline::{run, MergeOptions};
//!
//! let report = run(&MergeOptions::new("三月运单.xlsx"))?;
//! println!("{} groups written to {}", report.group_count, report.tabular_path.display());
//! ```

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::grouper::group_rows;
use super::normalize::normalize_table;
use super::partition::{default_selection, partition_columns};
use crate::config::{resolve_json_dir, MergeConfig, OUTPUT_SHEET_NAME};
use crate::error::{ExportError, PipelineResult, ValidationError};
use crate::export::{keyed_export_path, render, render_xlsx, serialize, to_pretty_json};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::parser::{load_table, LoadOptions, LoadedTable, DEFAULT_HEADER_ROW};
use crate::validation::validate_keyed_export;

/// Options for one merge run
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Source workbook or delimited file
    pub input: PathBuf,

    /// Sheet to read (first sheet when `None`)
    pub sheet: Option<String>,

    /// 1-based header row
    pub header_row: usize,

    /// Selected key columns (canonical columns present in the table when `None`)
    pub keys: Option<Vec<String>>,

    /// Tabular output path (`<input dir>/结果-<stem>_gui.xlsx` when `None`)
    pub output: Option<PathBuf>,

    /// Keyed-export directory (environment or default when `None`)
    pub json_dir: Option<PathBuf>,

    pub config: MergeConfig,
}

impl MergeOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            sheet: None,
            header_row: DEFAULT_HEADER_ROW,
            keys: None,
            output: None,
            json_dir: None,
            config: MergeConfig::default(),
        }
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            sheet: self.sheet.clone(),
            header_row: self.header_row,
        }
    }
}

/// Summary of a completed merge run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub sheet: String,
    pub key_columns: Vec<String>,
    pub detail_columns: Vec<String>,
    pub row_count: usize,
    pub group_count: usize,
    /// Key strings shared by distinct group keys (their records share one JSON entry)
    pub collisions: Vec<String>,
    pub tabular_path: PathBuf,
    pub keyed_path: PathBuf,
}

/// First rows of a table in normalized form, for choosing key columns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub sheet: String,
    pub columns: Vec<String>,
    /// Columns that `merge` selects as keys when none are given
    pub default_keys: Vec<String>,
    pub total_rows: usize,
    pub rows: Vec<Vec<String>>,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
}

/// Default tabular output path: `结果-<stem>_gui.xlsx` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("结果-{}_gui.xlsx", stem))
}

/// Load a table and normalize its first `limit` rows.
pub fn preview(
    input: &Path,
    options: &LoadOptions,
    limit: usize,
    config: &MergeConfig,
) -> PipelineResult<TablePreview> {
    check_header_row(options.header_row)?;
    let loaded = load_table(input, options)?;
    let total_rows = loaded.table.len();

    let mut head = loaded.table.clone();
    head.rows.truncate(limit);
    let normalized = normalize_table(&head, config);

    Ok(TablePreview {
        default_keys: default_selection(&loaded.table.columns, config),
        columns: normalized.columns,
        rows: normalized.rows,
        total_rows,
        sheet: loaded.sheet,
        encoding: loaded.encoding,
        delimiter: loaded.delimiter,
    })
}

/// Run the full merge for one input file.
///
/// A failing run is reported through [`log_error`] before the error is returned.
pub fn run(options: &MergeOptions) -> PipelineResult<MergeReport> {
    logged(load_and_merge(options))
}

/// Run the merge on an already loaded table.
pub fn run_loaded(loaded: LoadedTable, options: &MergeOptions) -> PipelineResult<MergeReport> {
    logged(merge_loaded(loaded, options))
}

fn logged(result: PipelineResult<MergeReport>) -> PipelineResult<MergeReport> {
    if let Err(ref e) = result {
        log_error(format!("Merge failed: {}", e));
    }
    result
}

fn load_and_merge(options: &MergeOptions) -> PipelineResult<MergeReport> {
    check_header_row(options.header_row)?;

    log_info(format!("📖 Reading {}...", options.input.display()));
    let loaded = load_table(&options.input, &options.load_options())?;
    log_loaded(&loaded);

    merge_loaded(loaded, options)
}

fn merge_loaded(loaded: LoadedTable, options: &MergeOptions) -> PipelineResult<MergeReport> {
    let config = &options.config;
    let table = loaded.table;

    let selected = match &options.keys {
        Some(keys) => keys.clone(),
        None => default_selection(&table.columns, config),
    };
    let plan = partition_columns(&table.columns, &selected, config)?;
    log_info(format!("🔑 Key columns: {}", plan.key_names().join(", ")));

    log_info("🔄 Normalizing cells...");
    let normalized = normalize_table(&table, config);

    log_info("📦 Grouping rows...");
    let grouped = group_rows(&normalized, &plan, config);
    log_success(format!(
        "{} rows in {} groups",
        grouped.record_count(),
        grouped.len()
    ));

    let collisions = grouped.key_string_collisions();
    if !collisions.is_empty() {
        log_warning(format!(
            "{} key string(s) shared by different groups, their JSON entries are merged",
            collisions.len()
        ));
        for key in &collisions {
            log_info_indent(key.clone(), 1);
        }
    }

    log_info("📝 Rendering outputs...");
    let sheet = render(&grouped);
    let xlsx_bytes = render_xlsx(&sheet, OUTPUT_SHEET_NAME)?;

    let keyed = serde_json::Value::Object(serialize(&grouped));
    validate_keyed_export(&keyed).map_err(|errors| ExportError::Schema { errors })?;
    let json_text = to_pretty_json(&keyed)?;

    let tabular_path = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&options.input));
    let json_dir = resolve_json_dir(options.json_dir.as_deref());
    let keyed_path = keyed_export_path(&json_dir, &tabular_path);

    write_both(&tabular_path, &xlsx_bytes, &keyed_path, json_text.as_bytes())?;
    log_success(format!("Tabular output: {}", tabular_path.display()));
    log_success(format!("Keyed export: {}", keyed_path.display()));

    Ok(MergeReport {
        sheet: loaded.sheet,
        key_columns: grouped.key_columns.clone(),
        detail_columns: grouped.detail_headers.clone(),
        row_count: grouped.record_count(),
        group_count: grouped.len(),
        collisions,
        tabular_path,
        keyed_path,
    })
}

fn check_header_row(header_row: usize) -> Result<(), ValidationError> {
    if header_row == 0 {
        return Err(ValidationError::InvalidHeaderRow(header_row));
    }
    Ok(())
}

fn log_loaded(loaded: &LoadedTable) {
    if let Some(encoding) = &loaded.encoding {
        log_success(format!("Detected encoding: {}", encoding));
    }
    if let Some(delimiter) = loaded.delimiter {
        log_success(format!("Detected separator: '{}'", format_delimiter(delimiter)));
    }
    log_success(format!(
        "Sheet '{}': {} rows, {} columns",
        loaded.sheet,
        loaded.table.len(),
        loaded.table.columns.len()
    ));
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

/// Write both artifacts, or neither.
fn write_both(
    first: &Path,
    first_bytes: &[u8],
    second: &Path,
    second_bytes: &[u8],
) -> Result<(), ExportError> {
    for path in [first, second] {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ExportError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
    }

    fs::write(first, first_bytes).map_err(|source| ExportError::Write {
        path: first.to_path_buf(),
        source,
    })?;

    if let Err(source) = fs::write(second, second_bytes) {
        let _ = fs::remove_file(first);
        return Err(ExportError::Write {
            path: second.to_path_buf(),
            source,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::logs::{LogLevel, LOG_BROADCASTER};
    use calamine::{open_workbook, open_workbook_auto, Data, Reader, Xlsx};
    use tokio::sync::broadcast::error::TryRecvError;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    const SAMPLE_CSV: &str = "三月运单汇总\n\
        日期,运单号码,费用(元),备注\n\
        45901,A1,10.0,\n\
        45901,A1,5,加急\n\
        2025/1/2,B2,3.5,\n";

    fn write_sample(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("三月.csv");
        fs::write(&path, SAMPLE_CSV).unwrap();
        path
    }

    fn options(dir: &TempDir, input: PathBuf) -> MergeOptions {
        let mut opts = MergeOptions::new(input);
        opts.keys = Some(vec!["日期".to_string(), "运单号码".to_string()]);
        opts.json_dir = Some(dir.path().join("json"));
        opts
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/data/三月.xlsx"));
        assert_eq!(path, PathBuf::from("/data/结果-三月_gui.xlsx"));
    }

    #[test]
    fn test_run_writes_both_outputs() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);
        crate::logs::set_echo(false);

        let report = run(&options(&dir, input)).unwrap();

        assert_eq!(report.group_count, 2);
        assert_eq!(report.row_count, 3);
        assert_eq!(report.key_columns, vec!["日期", "运单号码"]);
        assert_eq!(report.detail_columns, vec!["费用", "备注"]);
        assert!(report.collisions.is_empty());
        assert_eq!(report.tabular_path, dir.path().join("结果-三月_gui.xlsx"));
        assert_eq!(report.keyed_path, dir.path().join("json").join("结果-三月_gui_data.json"));

        let text = fs::read_to_string(&report.keyed_path).unwrap();
        let keyed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            keyed,
            json!({
                "2025-09-01_A1": [
                    { "费用": 10.0, "备注": "" },
                    { "费用": 5.0, "备注": "加急" }
                ],
                "2025-01-02_B2": [
                    { "费用": 3.5, "备注": "" }
                ]
            })
        );
        assert!(text.contains("加急"));
        assert!(text.contains("\n    \"2025-09-01_A1\""));

        let order: Vec<&String> = keyed.as_object().unwrap().keys().collect();
        assert_eq!(order, vec!["2025-09-01_A1", "2025-01-02_B2"]);
    }

    #[test]
    fn test_tabular_output_reads_back() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);
        crate::logs::set_echo(false);

        let report = run(&options(&dir, input)).unwrap();

        let mut workbook = open_workbook_auto(&report.tabular_path).unwrap();
        assert_eq!(workbook.sheet_names(), vec![OUTPUT_SHEET_NAME.to_string()]);
        let range = workbook.worksheet_range(OUTPUT_SHEET_NAME).unwrap();

        let header: Vec<String> = range.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(header, vec!["序号", "日期", "运单号码", "费用", "备注"]);

        assert_eq!(range.get_value((1, 0)), Some(&Data::Float(1.0)));
        assert_eq!(range.get_value((1, 1)), Some(&Data::String("2025-09-01".into())));
        assert_eq!(range.get_value((2, 3)), Some(&Data::Float(5.0)));
        assert_eq!(range.get_value((3, 0)), Some(&Data::Float(2.0)));
        assert_eq!(range.get_value((3, 2)), Some(&Data::String("B2".into())));
    }

    #[test]
    fn test_default_key_selection() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);
        crate::logs::set_echo(false);

        let mut opts = options(&dir, input);
        opts.keys = None;
        let report = run(&opts).unwrap();
        // 日期 and 运单号码 are both canonical key columns
        assert_eq!(report.key_columns, vec!["日期", "运单号码"]);
    }

    #[test]
    fn test_empty_key_selection_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);
        crate::logs::set_echo(false);

        let mut opts = options(&dir, input);
        opts.keys = Some(Vec::new());
        let err = run(&opts).unwrap_err();

        assert!(err.is_validation());
        assert!(matches!(err, PipelineError::Validation(ValidationError::NoKeyColumns)));
        assert!(!dir.path().join("结果-三月_gui.xlsx").exists());
        assert!(!dir.path().join("json").exists());
    }

    #[test]
    fn test_merge_regions_read_back() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);
        crate::logs::set_echo(false);

        let report = run(&options(&dir, input)).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&report.tabular_path).unwrap();
        let mut merges: Vec<((u32, u32), (u32, u32))> = workbook
            .worksheet_merge_cells(OUTPUT_SHEET_NAME)
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|d| (d.start, d.end))
            .collect();
        merges.sort();

        // Sequence and both key columns over the two A1 rows; B2 is a single row
        assert_eq!(
            merges,
            vec![((1, 0), (2, 0)), ((1, 1), (2, 1)), ((1, 2), (2, 2))]
        );
    }

    #[test]
    fn test_failed_run_logs_error() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);
        crate::logs::set_echo(false);
        let mut rx = LOG_BROADCASTER.subscribe();

        let mut opts = options(&dir, input);
        opts.keys = Some(vec!["签收人".to_string()]);
        assert!(run(&opts).is_err());

        let mut logged = false;
        loop {
            match rx.try_recv() {
                Ok(entry) => {
                    if entry.level == LogLevel::Error && entry.message.contains("签收人") {
                        logged = true;
                    }
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(logged);
    }

    #[test]
    fn test_unknown_key_column() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);
        crate::logs::set_echo(false);

        let mut opts = options(&dir, input);
        opts.keys = Some(vec!["收件人".to_string()]);
        let err = run(&opts).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::UnknownColumn(ref c)) if c == "收件人"
        ));
    }

    #[test]
    fn test_header_row_zero_rejected() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);

        let mut opts = options(&dir, input);
        opts.header_row = 0;
        let err = run(&opts).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ValidationError::InvalidHeaderRow(0))));
    }

    #[test]
    fn test_missing_input_is_load_error() {
        let dir = TempDir::new().unwrap();
        let opts = options(&dir, dir.path().join("missing.csv"));
        let err = run(&opts).unwrap_err();
        assert!(matches!(err, PipelineError::Load(_)));
        assert!(err.to_string().starts_with("load: "));
    }

    #[test]
    fn test_second_write_failure_removes_first() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("out.xlsx");
        // A directory where the file should go makes the write fail
        let second = dir.path().join("blocked");
        fs::create_dir(&second).unwrap();

        let result = write_both(&first, b"xlsx", &second, b"{}");
        assert!(matches!(result, Err(ExportError::Write { .. })));
        assert!(!first.exists());
    }

    #[test]
    fn test_preview() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);

        let preview = preview(&input, &LoadOptions::default(), 2, &MergeConfig::default()).unwrap();
        assert_eq!(preview.columns, vec!["日期", "运单号码", "费用(元)", "备注"]);
        assert_eq!(preview.default_keys, vec!["日期", "运单号码"]);
        assert_eq!(preview.total_rows, 3);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[0][0], "2025-09-01");
        assert_eq!(preview.encoding.as_deref(), Some("utf-8"));
        assert_eq!(preview.delimiter, Some(','));
    }

    #[test]
    fn test_preview_follows_config() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir);
        let config = MergeConfig::from_json(r#"{ "keyOrder": ["备注"], "dateKeywords": [] }"#)
            .unwrap();

        let preview = preview(&input, &LoadOptions::default(), 1, &config).unwrap();
        assert_eq!(preview.default_keys, vec!["备注"]);
        // 日期 is no longer a date column, so the serial stays a number
        assert_eq!(preview.rows[0][0], "45901");
    }
}

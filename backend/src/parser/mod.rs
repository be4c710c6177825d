//! Source table loading.
//!
//! Workbooks are read through [`workbook`] (calamine). Delimited text files are
//! decoded with encoding auto-detection and parsed with delimiter
//! auto-detection. Both paths end in a grid of [`CellValue`]s from which the
//! header row is picked to build a [`RawTable`].

pub mod workbook;

use std::collections::HashSet;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::{CellValue, RawTable};

/// Header row used when none is given (the shipment workbooks carry a title row).
pub const DEFAULT_HEADER_ROW: usize = 2;

/// Kind of source file, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Workbook,
    Delimited,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceKind::Workbook),
            "csv" | "tsv" | "txt" => Ok(SourceKind::Delimited),
            _ => Err(LoadError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Which sheet and header row to read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Sheet name; first sheet when `None`. Ignored for delimited files.
    pub sheet: Option<String>,
    /// 1-based row holding the column names.
    pub header_row: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            header_row: DEFAULT_HEADER_ROW,
        }
    }
}

/// A loaded table with metadata about how it was read.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    /// Sheet name, or the file stem for delimited files.
    pub sheet: String,
    /// Detected encoding (delimited files only).
    pub encoding: Option<String>,
    /// Detected delimiter (delimited files only).
    pub delimiter: Option<char>,
}

/// Sheet names of a source file. Delimited files have one pseudo-sheet named after the file.
pub fn list_sheets(path: &Path) -> LoadResult<Vec<String>> {
    match SourceKind::from_path(path)? {
        SourceKind::Workbook => workbook::sheet_names(path),
        SourceKind::Delimited => Ok(vec![file_stem(path)]),
    }
}

/// Load the table from a workbook or delimited file.
pub fn load_table(path: &Path, options: &LoadOptions) -> LoadResult<LoadedTable> {
    match SourceKind::from_path(path)? {
        SourceKind::Workbook => {
            let (sheet, grid) = workbook::read_sheet(path, options.sheet.as_deref())?;
            Ok(LoadedTable {
                table: build_table(grid, options.header_row)?,
                sheet,
                encoding: None,
                delimiter: None,
            })
        }
        SourceKind::Delimited => {
            let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let parsed = parse_delimited_bytes(&bytes)?;
            Ok(LoadedTable {
                table: build_table(parsed.grid, options.header_row)?,
                sheet: file_stem(path),
                encoding: Some(parsed.encoding),
                delimiter: Some(parsed.delimiter),
            })
        }
    }
}

/// Build a table from a grid, using 1-based `header_row` for column names.
///
/// Blank header cells become `Unnamed: <index>`, duplicates get `.1`, `.2`, ...
pub fn build_table(grid: Vec<Vec<CellValue>>, header_row: usize) -> LoadResult<RawTable> {
    let header_idx = header_row.saturating_sub(1);
    if header_idx >= grid.len() {
        return Err(LoadError::HeaderRowOutOfRange {
            row: header_row,
            last: grid.len(),
        });
    }

    let width = grid.iter().skip(header_idx).map(Vec::len).max().unwrap_or(0);
    let mut rows = grid.into_iter().skip(header_idx);
    let header = rows.next().unwrap_or_default();

    let names: Vec<String> = (0..width)
        .map(|i| header_name(header.get(i).unwrap_or(&CellValue::Empty), i))
        .collect();

    Ok(RawTable::new(dedupe_names(names), rows.collect()))
}

fn header_name(cell: &CellValue, index: usize) -> String {
    match cell {
        CellValue::Empty => format!("Unnamed: {}", index),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                format!("Unnamed: {}", index)
            } else {
                trimmed.to_string()
            }
        }
        CellValue::Number(n) => format!("{}", n),
        CellValue::Date(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", name, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// =============================================================================
// Delimited text
// =============================================================================

/// Result of parsing delimited bytes.
#[derive(Debug, Clone)]
pub struct DelimitedGrid {
    pub grid: Vec<Vec<CellValue>>,
    pub encoding: String,
    pub delimiter: char,
}

/// Detect the encoding of raw bytes. Valid UTF-8 wins; otherwise chardet decides.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "gb2312" | "gbk" | "gb18030" | "cp936" => "gb18030".to_string(),
        "big5" => "big5".to_string(),
        _ => charset,
    }
}

/// Decode bytes using the specified encoding label.
///
/// Unknown labels fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let codec = encoding_rs::Encoding::for_label(encoding.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (decoded, _, _) = codec.decode(bytes);
    decoded.into_owned()
}

/// Detect the delimiter by counting occurrences in the first lines.
///
/// Several lines are inspected so a leading title line does not decide alone.
pub fn detect_delimiter(content: &str) -> char {
    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = content
            .lines()
            .take(5)
            .map(|line| line.matches(sep).count())
            .max()
            .unwrap_or(0);
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse delimited text into a grid of text cells.
pub fn parse_delimited(content: &str, delimiter: char) -> LoadResult<Vec<Vec<CellValue>>> {
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| LoadError::Csv(format!("Unsupported delimiter: {:?}", delimiter)))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for (line_idx, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| LoadError::Csv(format!("line {}: {}", line_idx + 1, e)))?;
        grid.push(record.iter().map(CellValue::text).collect());
    }
    Ok(grid)
}

/// Parse delimited bytes with auto-detection of encoding and delimiter.
pub fn parse_delimited_bytes(bytes: &[u8]) -> LoadResult<DelimitedGrid> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(LoadError::Csv("file is empty".to_string()));
    }

    let delimiter = detect_delimiter(content);
    let grid = parse_delimited(content, delimiter)?;

    Ok(DelimitedGrid {
        grid,
        encoding,
        delimiter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn text_grid(rows: &[&[&str]]) -> Vec<Vec<CellValue>> {
        rows.iter()
            .map(|r| r.iter().map(|s| CellValue::text(*s)).collect())
            .collect()
    }

    #[test]
    fn test_source_kind() {
        assert_eq!(SourceKind::from_path(Path::new("a.XLSX")).unwrap(), SourceKind::Workbook);
        assert_eq!(SourceKind::from_path(Path::new("a.csv")).unwrap(), SourceKind::Delimited);
        assert!(matches!(
            SourceKind::from_path(Path::new("a.pdf")),
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_build_table_with_title_row() {
        let grid = text_grid(&[
            &["三月运单汇总"],
            &["日期", "运单号码", "费用(元)"],
            &["2025-03-01", "A1", "10"],
            &["", "", ""],
            &["2025-03-02", "A2"],
        ]);

        let table = build_table(grid, 2).unwrap();

        assert_eq!(table.columns, vec!["日期", "运单号码", "费用(元)"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1][2], CellValue::Empty);
    }

    #[test]
    fn test_header_names_unnamed_and_duplicates() {
        let grid = text_grid(&[&["箱数", "", "箱数", "箱数"], &["1", "2", "3", "4", "5"]]);
        let table = build_table(grid, 1).unwrap();
        assert_eq!(
            table.columns,
            vec!["箱数", "Unnamed: 1", "箱数.1", "箱数.2", "Unnamed: 4"]
        );
    }

    #[test]
    fn test_header_row_out_of_range() {
        let grid = text_grid(&[&["a"], &["1"]]);
        let result = build_table(grid, 5);
        assert!(matches!(
            result,
            Err(LoadError::HeaderRowOutOfRange { row: 5, last: 2 })
        ));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_parse_quoted_fields() {
        let grid = parse_delimited("名称,备注\n\"上海, 浦东\",ok\n", ',').unwrap();
        assert_eq!(grid[1][0], CellValue::Text("上海, 浦东".into()));
        assert_eq!(grid[1][1], CellValue::Text("ok".into()));
    }

    #[test]
    fn test_gbk_decoding() {
        let (bytes, _, _) = encoding_rs::GBK.encode("日期,运单号码,寄件地区\n2025-01-02,A1,上海\n");
        assert_ne!(detect_encoding(&bytes), "utf-8");
        let decoded = decode_content(&bytes, "gb18030");
        assert!(decoded.starts_with("日期,运单号码"));
    }

    #[test]
    fn test_title_line_does_not_decide_delimiter() {
        assert_eq!(detect_delimiter("三月汇总\n日期;运单号码;箱数\n1;2;3"), ';');
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let parsed = parse_delimited_bytes("\u{feff}日期;箱数\n2025-01-02;3".as_bytes()).unwrap();
        assert_eq!(parsed.encoding, "utf-8");
        assert_eq!(parsed.delimiter, ';');
        assert_eq!(parsed.grid[0][0], CellValue::Text("日期".into()));
    }

    #[test]
    fn test_load_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("march.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "运单汇总").unwrap();
        writeln!(file, "日期,运单号码,费用(元)").unwrap();
        writeln!(file, "45901,A1,10.0").unwrap();

        let loaded = load_table(&path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.sheet, "march");
        assert_eq!(loaded.delimiter, Some(','));
        assert_eq!(loaded.table.columns, vec!["日期", "运单号码", "费用(元)"]);
        assert_eq!(loaded.table.rows[0][0], CellValue::Text("45901".into()));
        assert_eq!(list_sheets(&path).unwrap(), vec!["march"]);
    }
}

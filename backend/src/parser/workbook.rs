//! Workbook reading through calamine (`.xlsx`, `.xlsm`, `.xls`, `.xlsb`, `.ods`).

use calamine::{open_workbook_auto, Data, ExcelDateTime, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::CellValue;

/// List the sheet names of a workbook, in workbook order.
pub fn sheet_names(path: &Path) -> LoadResult<Vec<String>> {
    let workbook = open_workbook_auto(path).map_err(|e| LoadError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(workbook.sheet_names())
}

/// Read one sheet (the first when `sheet` is `None`) as an absolute grid of cells.
///
/// Grid row `i` is sheet row `i + 1`, whatever the used range of the sheet is.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> LoadResult<(String, Vec<Vec<CellValue>>)> {
    let mut workbook = open_workbook_auto(path).map_err(|e| LoadError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| LoadError::SheetNotFound {
                name: wanted.to_string(),
                available: names.join(", "),
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| LoadError::EmptySheet(path.display().to_string()))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| LoadError::Workbook {
            path: path.to_path_buf(),
            message: format!("failed loading sheet '{}': {}", name, e),
        })?;

    if range.is_empty() {
        return Err(LoadError::EmptySheet(name));
    }

    let grid = grid_from_range(&range);
    Ok((name, grid))
}

/// Expand a used range into a grid anchored at cell A1.
fn grid_from_range(range: &Range<Data>) -> Vec<Vec<CellValue>> {
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let (height, width) = range.get_size();
    let total_cols = start_col + width;

    let mut grid = vec![vec![CellValue::Empty; total_cols]; start_row];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; start_col];
        cells.extend(row.iter().map(cell_from_data));
        grid.push(cells);
    }
    debug_assert_eq!(grid.len(), start_row + height);
    grid
}

/// Tag a calamine cell.
pub fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(dt) => date_time_cell(dt),
        Data::DateTimeIso(s) => parse_iso(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::text(s.as_str())),
        Data::DurationIso(s) => CellValue::text(s.as_str()),
    }
}

/// Native date cells honour the workbook's 1900/1904 date system.
/// Time-only cells become `HH:MM:SS` text.
fn date_time_cell(dt: &ExcelDateTime) -> CellValue {
    if dt.is_duration() {
        return match dt.as_duration() {
            Some(duration) => CellValue::Text(format_duration(duration.num_milliseconds())),
            None => CellValue::Number(dt.as_f64()),
        };
    }
    match dt.as_datetime() {
        Some(ts) => CellValue::Date(ts),
        None => CellValue::Number(dt.as_f64()),
    }
}

fn format_duration(total_millis: i64) -> String {
    let sign = if total_millis < 0 { "-" } else { "" };
    let secs = (total_millis.abs() + 500) / 1_000;
    format!(
        "{sign}{:02}:{:02}:{:02}",
        secs / 3_600,
        (secs % 3_600) / 60,
        secs % 60
    )
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::ExcelDateTimeType;

    #[test]
    fn test_cell_mapping() {
        assert_eq!(cell_from_data(&Data::Empty), CellValue::Empty);
        assert_eq!(cell_from_data(&Data::String("  ".into())), CellValue::Empty);
        assert_eq!(cell_from_data(&Data::String("A1".into())), CellValue::Text("A1".into()));
        assert_eq!(cell_from_data(&Data::Float(3.5)), CellValue::Number(3.5));
        assert_eq!(cell_from_data(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(cell_from_data(&Data::Bool(true)), CellValue::Text("True".into()));
    }

    #[test]
    fn test_iso_datetime_cell() {
        let cell = cell_from_data(&Data::DateTimeIso("2025-09-01T08:30:00".into()));
        let expected = NaiveDate::from_ymd_opt(2025, 9, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(cell, CellValue::Date(expected));

        let cell = cell_from_data(&Data::DateTimeIso("not a date".into()));
        assert_eq!(cell, CellValue::Text("not a date".into()));
    }

    #[test]
    fn test_1904_date_system_cell() {
        let cell = cell_from_data(&Data::DateTime(ExcelDateTime::new(
            44439.0,
            ExcelDateTimeType::DateTime,
            true,
        )));
        let expected = NaiveDate::from_ymd_opt(2025, 9, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(cell, CellValue::Date(expected));
    }

    #[test]
    fn test_1900_date_system_cell() {
        let cell = cell_from_data(&Data::DateTime(ExcelDateTime::new(
            45901.5,
            ExcelDateTimeType::DateTime,
            false,
        )));
        let expected = NaiveDate::from_ymd_opt(2025, 9, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(cell, CellValue::Date(expected));
    }

    #[test]
    fn test_time_only_cell_is_text() {
        let cell = cell_from_data(&Data::DateTime(ExcelDateTime::new(
            0.375,
            ExcelDateTimeType::TimeDelta,
            false,
        )));
        assert_eq!(cell, CellValue::Text("09:00:00".into()));

        let config = crate::config::MergeConfig::default();
        let normalized = crate::transform::normalize::normalize(&cell, "出库时间", &config);
        assert_eq!(normalized, "09:00:00");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30_585_600), "08:29:46");
        assert_eq!(format_duration(90_000_000), "25:00:00");
        assert_eq!(format_duration(-60_000), "-00:01:00");
    }

    #[test]
    fn test_missing_workbook_is_load_error() {
        let result = read_sheet(Path::new("/nonexistent/book.xlsx"), None);
        assert!(matches!(result, Err(LoadError::Workbook { .. })));
    }
}

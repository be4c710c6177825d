//! Cell normalization: raw cells to canonical display strings.
//!
//! Date-flagged columns (name contains a date keyword) get date-aware handling:
//! native dates, Excel day serials and date-like text all become `YYYY-MM-DD`.
//! Every column then goes through two repair passes: a trailing `.0` trim and a
//! scientific-notation repair.
//!
//! ```text
//! 45901.0       (日期)   →  2025-09-01
//! "45932.0"     (日期)   →  2025-10-02
//! "45932.0"     (箱数)   →  45932
//! "1.23e+10"    (运单号码) →  12300000000
//! "2025/1/2"    (日期)   →  2025-01-02
//! ```
//!
//! Nothing here fails: any value that cannot be interpreted is kept verbatim.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MergeConfig;
use crate::models::{CellValue, RawTable};

/// Year-first dates: `2025-01-02`, `2025/1/2`, `2025.01.02`, `2025年1月2日`, optional time.
static YEAR_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})\s*[-/.年]\s*(\d{1,2})\s*[-/.月]\s*(\d{1,2})\s*日?(?:[ T]+\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?)?$")
        .expect("valid year-first date pattern")
});

/// Year-last dates: `13/02/2025`, `2-13-2025`, optional time.
static YEAR_LAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})(?:[ T]+\d{1,2}:\d{2}(?::\d{2})?)?$")
        .expect("valid year-last date pattern")
});

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Table with every cell in canonical string form.
///
/// Rows keep the full column count of the source table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Normalize a whole table, column by column.
pub fn normalize_table(table: &RawTable, config: &MergeConfig) -> NormalizedTable {
    let date_flags: Vec<bool> = table
        .columns
        .iter()
        .map(|c| config.is_date_column(c))
        .collect();

    let rows = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&date_flags)
                .map(|(cell, &is_date)| normalize_flagged(cell, is_date, config))
                .collect()
        })
        .collect();

    NormalizedTable {
        columns: table.columns.clone(),
        rows,
    }
}

/// Normalize one cell of the named column.
pub fn normalize(value: &CellValue, column: &str, config: &MergeConfig) -> String {
    normalize_flagged(value, config.is_date_column(column), config)
}

fn normalize_flagged(value: &CellValue, is_date: bool, config: &MergeConfig) -> String {
    let text = date_aware(value, is_date, config);
    repair_scientific(trim_float_suffix(text))
}

/// First-match rule chain producing the pre-repair string.
fn date_aware(value: &CellValue, is_date: bool, config: &MergeConfig) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(s) if s.trim().eq_ignore_ascii_case("nan") => String::new(),
        CellValue::Date(dt) => dt.format(DATE_FORMAT).to_string(),
        CellValue::Number(n) if !n.is_finite() => String::new(),
        CellValue::Number(n) if is_date => match serial_to_date(*n) {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => render_number(*n),
        },
        CellValue::Number(n) => render_number(*n),
        CellValue::Text(s) if is_date => {
            let trimmed = s.trim();
            if is_numeric_like(trimmed) {
                let serial = trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|v| *v > config.date_serial_threshold)
                    .and_then(serial_to_date);
                match serial {
                    Some(date) => date.format(DATE_FORMAT).to_string(),
                    None => trimmed.to_string(),
                }
            } else {
                match parse_date_text(trimmed) {
                    Some(date) => date.format(DATE_FORMAT).to_string(),
                    None => trimmed.to_string(),
                }
            }
        }
        CellValue::Text(s) => s.clone(),
    }
}

/// Convert an Excel day serial (epoch 1899-12-30) to a calendar date.
///
/// Fractional days count toward the time of day, so the date is the floor.
/// Serials outside years 1..=9999 yield `None`.
pub fn serial_to_date(days: f64) -> Option<NaiveDate> {
    serial_to_datetime(days).map(|dt| dt.date())
}

/// Convert an Excel day serial (epoch 1899-12-30) to a timestamp.
pub fn serial_to_datetime(days: f64) -> Option<NaiveDateTime> {
    if !days.is_finite() || days.abs() > 3_700_000.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (days * 86_400_000.0).round() as i64;
    let dt = epoch.checked_add_signed(Duration::milliseconds(millis))?;
    (1..=9999).contains(&dt.year()).then_some(dt)
}

/// ASCII digits with at most one decimal point, and at least one digit.
pub fn is_numeric_like(s: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for c in s.chars() {
        match c {
            '.' => dots += 1,
            '0'..='9' => digits += 1,
            _ => return false,
        }
    }
    dots <= 1 && digits > 0
}

/// Parse a date-like string. Day/month order must be unambiguous.
pub fn parse_date_text(s: &str) -> Option<NaiveDate> {
    if let Some(caps) = YEAR_FIRST.captures(s) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = YEAR_LAST.captures(s) {
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        let (month, day) = match (first > 12, second > 12) {
            (true, false) => (second, first),
            (false, true) => (first, second),
            (false, false) if first == second => (first, second),
            _ => return None,
        };
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }

    None
}

/// Shortest round-trip rendering, switching to an exponent (`1e-05`, `1.5e+16`)
/// for magnitudes below 1e-4 or from 1e16 up.
fn render_number(n: f64) -> String {
    let sci = format!("{:e}", n);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if n == 0.0 || (-4..16).contains(&exp) {
        return format!("{}", n);
    }
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exp.abs())
}

/// `"10.0"` → `"10"`.
pub fn trim_float_suffix(s: String) -> String {
    match s.strip_suffix(".0") {
        Some(stripped) => stripped.to_string(),
        None => s,
    }
}

/// `"1.23e+10"` → `"12300000000"`; anything that does not parse is unchanged.
pub fn repair_scientific(s: String) -> String {
    if !s.to_ascii_lowercase().contains("e+") {
        return s;
    }
    match s.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => {
            let truncated = f.trunc();
            if truncated == 0.0 {
                "0".to_string()
            } else {
                format!("{:.0}", truncated)
            }
        }
        _ => s,
    }
}

//! Write a [`TabularSheet`] to an `.xlsx` workbook.

use rust_xlsxwriter::{ColNum, Format, FormatAlign, RowNum, Workbook, Worksheet, XlsxError};

use super::tabular::{SheetCell, TabularSheet};
use crate::error::{ExportError, ExportResult};

/// Render the sheet into an in-memory `.xlsx` file.
pub fn render_xlsx(sheet: &TabularSheet, sheet_name: &str) -> ExportResult<Vec<u8>> {
    let mut workbook = build_workbook(sheet, sheet_name)?;
    Ok(workbook.save_to_buffer()?)
}

/// Build a single-sheet workbook from the sheet model.
pub fn build_workbook(sheet: &TabularSheet, sheet_name: &str) -> ExportResult<Workbook> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let fmt_center = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);

    for (col_idx, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string(0, cast_col_num(col_idx)?, header)?;
    }

    for (data_idx, row) in sheet.rows.iter().enumerate() {
        let row_idx = data_idx + 1;
        for (col_idx, cell) in row.iter().enumerate() {
            if sheet.is_merged_tail(row_idx, col_idx) {
                continue;
            }

            if let Some(merge) = sheet.merge_at(row_idx, col_idx) {
                worksheet.merge_range(
                    cast_row_num(merge.first_row)?,
                    cast_col_num(merge.col)?,
                    cast_row_num(merge.last_row)?,
                    cast_col_num(merge.col)?,
                    "",
                    &fmt_center,
                )?;
            }

            let format = sheet
                .is_centered(row_idx, col_idx)
                .then_some(&fmt_center);
            write_cell(worksheet, row_idx, col_idx, cell, format)?;
        }
    }

    worksheet.autofit();
    Ok(workbook)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    cell: &SheetCell,
    format: Option<&Format>,
) -> ExportResult<()> {
    let row = cast_row_num(row_idx)?;
    let col = cast_col_num(col_idx)?;
    match (cell, format) {
        (SheetCell::Empty, Some(format)) => {
            worksheet.write_blank(row, col, format)?;
        }
        (SheetCell::Empty, None) => {}
        (SheetCell::Text(val), Some(format)) => {
            worksheet.write_string_with_format(row, col, val, format)?;
        }
        (SheetCell::Text(val), None) => {
            worksheet.write_string(row, col, val)?;
        }
        (SheetCell::Number(val), Some(format)) => {
            worksheet.write_number_with_format(row, col, *val, format)?;
        }
        (SheetCell::Number(val), None) => {
            worksheet.write_number(row, col, *val)?;
        }
    }
    Ok(())
}

fn cast_row_num(idx: usize) -> ExportResult<RowNum> {
    RowNum::try_from(idx).map_err(|_| ExportError::from(XlsxError::RowColumnLimitError))
}

fn cast_col_num(idx: usize) -> ExportResult<ColNum> {
    ColNum::try_from(idx).map_err(|_| ExportError::from(XlsxError::RowColumnLimitError))
}

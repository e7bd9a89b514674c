use crate::utils::error::OcrError;
use crate::Result;
use calamine::{open_workbook, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use std::path::Path;

/// Read column A of the first worksheet, one string per row.
pub fn read_rows(path: &Path) -> Result<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| {
        OcrError::ExportIo(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| {
            OcrError::ExportIo(format!("Failed to read {}: {}", path.display(), e))
        })?,
        None => return Ok(Vec::new()),
    };

    let rows = range
        .rows()
        .map(|row| row.first().map(|cell| cell.to_string()).unwrap_or_default())
        .collect();

    Ok(rows)
}

/// Render a single-sheet workbook with `rows` in column A.
pub fn render(sheet_name: &str, rows: &[String]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name).map_err(xlsx_error)?;
    worksheet.set_column_width(0, 60).map_err(xlsx_error)?;

    for (row, text) in rows.iter().enumerate() {
        let row = u32::try_from(row)
            .map_err(|_| OcrError::ExportIo("Export store row limit exceeded".to_string()))?;
        worksheet.write_string(row, 0, text).map_err(xlsx_error)?;
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

fn xlsx_error(e: rust_xlsxwriter::XlsxError) -> OcrError {
    OcrError::ExportIo(format!("Failed to render workbook: {}", e))
}

/// Worksheet loading via `calamine`.
///
/// The core never walks the filesystem itself; callers hand over the raw
/// bytes they already read (the same bytes are hashed for file-level
/// dedup), and this module turns them into rows.
use crate::model::{Cell, Row};
use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use compact_str::CompactString;
use std::io::Cursor;

/// Reasons a workbook cannot be turned into rows.
#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    #[error("{0}")]
    Xlsx(#[from] calamine::XlsxError),
    #[error("workbook contains no worksheets")]
    NoWorksheet,
}

/// Load the first worksheet of an `.xlsx` workbook held in memory.
///
/// This is the first sheet in workbook order, not the sheet that was
/// active when the file was saved. Exports with a single sheet, which is
/// what the NCT lists are, read the same either way.
///
/// Rows and columns are anchored at A1: calamine trims leading empty rows
/// and columns from the used range, and they are re-inserted here so that
/// row and column indices match absolute sheet positions.
pub fn load_rows(bytes: &[u8]) -> Result<Vec<Row>, WorkbookError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(WorkbookError::NoWorksheet)??;
    Ok(range_to_rows(&range))
}

/// Convert a calamine range into A1-anchored rows.
pub fn range_to_rows(range: &Range<Data>) -> Vec<Row> {
    let Some((first_row, first_col)) = range.start() else {
        return Vec::new();
    };
    let lead_cols = first_col as usize;

    let mut rows: Vec<Row> = Vec::with_capacity(first_row as usize + range.height());
    rows.extend((0..first_row).map(|_| Row::default()));
    for source in range.rows() {
        let mut cells = Vec::with_capacity(lead_cols + source.len());
        cells.extend(std::iter::repeat(Cell::Empty).take(lead_cols));
        cells.extend(source.iter().map(convert));
        rows.push(Row::new(cells));
    }
    rows
}

fn convert(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(CompactString::new(s)),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(CompactString::new(s)),
        Data::Error(e) => Cell::Text(CompactString::new(e.to_string())),
    }
}

/// A single logical sub-table discovered inside a worksheet.
use super::cell::Row;
use serde::Serialize;

/// One NCT block: the rows between a sentinel row and the next sentinel
/// (or the end of the sheet).
///
/// `data_rows` never contains a sentinel row or a blank row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Block {
    /// Zero-based index of the sentinel row that opened this block.
    pub start_row: usize,
    /// Row carrying the schema label ("Код группы ОП"). Empty when none was
    /// found before the next sentinel.
    pub header_row: Row,
    /// Row used to locate quota-flag columns. Falls back to `header_row`
    /// when no non-blank row follows the header.
    pub category_row: Row,
    pub data_rows: Vec<Row>,
}

impl Block {
    /// `true` if this block has a usable category row.
    ///
    /// A worksheet matches the expected layout only when at least one of
    /// its blocks does.
    pub fn has_schema(&self) -> bool {
        !self.category_row.is_empty()
    }

    /// 1-based spreadsheet row number of the sentinel, as shown in Excel.
    pub fn sheet_row(&self) -> usize {
        self.start_row + 1
    }
}

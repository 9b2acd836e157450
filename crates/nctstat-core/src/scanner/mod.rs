/// Block scanner — splits a worksheet into NCT blocks.
///
/// An NCT export is one worksheet holding many sub-tables, each opened by
/// a sentinel row naming the testing authority. A block is:
///
/// ```text
/// sentinel row          "... Национальный Центр Тестирования ..."
/// (title rows)
/// header row            "№ | ФИО | ... | Код группы ОП | ... | Примечание"
/// (blank rows)
/// category row          "  |     | ... | АБ | АГП | ... "
/// data rows ...         (blank rows dropped)
/// next sentinel / end of sheet
/// ```
///
/// The scan is a single forward pass and a pure function of its input:
/// scanning the same rows twice yields identical blocks.
pub mod workbook;

use crate::model::{Block, Row};
use crate::vocabulary::{GROUP_CODE_LABEL, SENTINEL_PHRASE};
use tracing::debug;

/// `true` if any cell of `row` contains the sentinel phrase.
#[inline]
pub fn is_sentinel(row: &Row) -> bool {
    row.any_contains(SENTINEL_PHRASE)
}

/// `true` if `row` carries the schema ("group code") column label.
#[inline]
pub fn is_header(row: &Row) -> bool {
    row.position_of(GROUP_CODE_LABEL).is_some()
}

/// Split `rows` into blocks. A worksheet without sentinels yields no blocks.
pub fn scan_blocks(rows: &[Row]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < rows.len() {
        if !is_sentinel(&rows[i]) {
            i += 1;
            continue;
        }
        let (block, next) = scan_block(rows, i);
        debug!(
            "Block at row {}: header={} categories={} data_rows={}",
            block.sheet_row(),
            !block.header_row.is_empty(),
            block.category_row.len(),
            block.data_rows.len()
        );
        blocks.push(block);
        // `next` is the following sentinel (or the end), so it is re-examined
        // by the outer loop rather than skipped.
        i = next;
    }

    blocks
}

/// Scan one block opened by the sentinel at `start`.
///
/// Returns the block and the index at which the outer scan resumes.
fn scan_block(rows: &[Row], start: usize) -> (Block, usize) {
    let end = next_sentinel(rows, start + 1);
    let mut block = Block {
        start_row: start,
        ..Block::default()
    };

    let Some(header_idx) = (start + 1..end).find(|&j| is_header(&rows[j])) else {
        // No schema before the next sentinel: record the block with empty
        // header, categories and data.
        return (block, end);
    };
    block.header_row = rows[header_idx].clone();

    let data_start = match (header_idx + 1..end).find(|&k| !rows[k].is_blank()) {
        Some(category_idx) => {
            block.category_row = rows[category_idx].clone();
            category_idx + 1
        }
        None => {
            block.category_row = block.header_row.clone();
            header_idx + 1
        }
    };

    block.data_rows = rows[data_start..end]
        .iter()
        .filter(|row| !row.is_blank())
        .cloned()
        .collect();

    (block, end)
}

/// Index of the first sentinel at or after `from`, or `rows.len()`.
fn next_sentinel(rows: &[Row], from: usize) -> usize {
    rows[from.min(rows.len())..]
        .iter()
        .position(is_sentinel)
        .map_or(rows.len(), |offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &str = "РГКП Национальный Центр Тестирования МНВО РК";

    fn sentinel() -> Row {
        Row::from_texts(&[SENTINEL])
    }

    fn header() -> Row {
        Row::from_texts(&["№", "ФИО", "Код группы ОП", "Примечание"])
    }

    fn blank() -> Row {
        Row::from_texts(&["", "", ""])
    }

    #[test]
    fn no_sentinels_yields_no_blocks() {
        let rows = vec![header(), Row::from_texts(&["1", "x"]), blank()];
        assert!(scan_blocks(&rows).is_empty());
        assert!(scan_blocks(&[]).is_empty());
    }

    #[test]
    fn sentinel_detection_uses_substring_match() {
        assert!(is_sentinel(&sentinel()));
        assert!(is_sentinel(&Row::from_texts(&["", "Национальный Центр Тестирования"])));
        assert!(!is_sentinel(&Row::from_texts(&["Национальный центр тестирования"])));
    }

    #[test]
    fn basic_block_structure() {
        let rows = vec![
            Row::from_texts(&["preamble"]),
            sentinel(),
            Row::from_texts(&["Список"]),
            header(),
            blank(),
            Row::from_texts(&["", "", "АБ", "АГП"]),
            Row::from_texts(&["1", "A", "+", ""]),
            blank(),
            Row::from_texts(&["2", "B", "", "+"]),
        ];
        let blocks = scan_blocks(&rows);
        assert_eq!(blocks.len(), 1);
        let b = &blocks[0];
        assert_eq!(b.start_row, 1);
        assert_eq!(b.sheet_row(), 2);
        assert_eq!(b.header_row, header());
        assert_eq!(b.category_row, Row::from_texts(&["", "", "АБ", "АГП"]));
        assert_eq!(b.data_rows.len(), 2, "blank row between data rows dropped");
        assert!(b.has_schema());
    }

    #[test]
    fn header_label_matches_after_trim() {
        let rows = vec![
            sentinel(),
            Row::from_texts(&["№", " Код группы ОП "]),
            Row::from_texts(&["", "АБ"]),
        ];
        let blocks = scan_blocks(&rows);
        assert_eq!(blocks[0].header_row.len(), 2);
        assert_eq!(blocks[0].category_row, Row::from_texts(&["", "АБ"]));
    }

    #[test]
    fn consecutive_blocks_are_split_at_sentinels() {
        let rows = vec![
            sentinel(),
            header(),
            Row::from_texts(&["", "", "АБ"]),
            Row::from_texts(&["1", "A", "+"]),
            sentinel(),
            header(),
            Row::from_texts(&["", "", "АГП"]),
            Row::from_texts(&["2", "B", "+"]),
            Row::from_texts(&["3", "C", "+"]),
        ];
        let blocks = scan_blocks(&rows);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].start_row, 0);
        assert_eq!(blocks[0].data_rows.len(), 1);
        assert_eq!(blocks[1].start_row, 4);
        assert_eq!(blocks[1].data_rows.len(), 2);
    }

    #[test]
    fn sentinel_without_header_yields_empty_block() {
        let rows = vec![
            sentinel(),
            Row::from_texts(&["1", "orphan data"]),
            sentinel(),
            header(),
            Row::from_texts(&["", "", "АБ"]),
            Row::from_texts(&["1", "A", "+"]),
        ];
        let blocks = scan_blocks(&rows);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].header_row.is_empty());
        assert!(blocks[0].category_row.is_empty());
        assert!(blocks[0].data_rows.is_empty());
        assert!(!blocks[0].has_schema());
        assert!(blocks[1].has_schema());
    }

    /// A header at the end of the sheet has no category row after it, so
    /// the header itself doubles as the category row.
    #[test]
    fn category_row_falls_back_to_header_at_end_of_sheet() {
        let rows = vec![sentinel(), header(), blank(), blank()];
        let blocks = scan_blocks(&rows);
        assert_eq!(blocks[0].category_row, header());
        assert!(blocks[0].data_rows.is_empty());
    }

    #[test]
    fn category_row_falls_back_to_header_before_next_sentinel() {
        let rows = vec![
            sentinel(),
            header(),
            blank(),
            sentinel(),
            header(),
            Row::from_texts(&["", "", "АБ"]),
        ];
        let blocks = scan_blocks(&rows);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].category_row, header());
        assert!(blocks[0].data_rows.is_empty());
        assert_eq!(blocks[1].category_row, Row::from_texts(&["", "", "АБ"]));
    }

    #[test]
    fn data_rows_never_contain_blank_or_sentinel_rows() {
        let rows = vec![
            sentinel(),
            header(),
            Row::from_texts(&["", "", "АБ"]),
            Row::from_texts(&["1", "A", "+"]),
            blank(),
            Row::default(),
            Row::from_texts(&["2", "B", ""]),
            sentinel(),
            header(),
            Row::from_texts(&["", "", "АБ"]),
            blank(),
            Row::from_texts(&["3", "C", "+"]),
        ];
        for block in scan_blocks(&rows) {
            for row in &block.data_rows {
                assert!(!row.is_blank());
                assert!(!is_sentinel(row));
            }
        }
    }

    #[test]
    fn scanning_is_idempotent() {
        let rows = vec![
            sentinel(),
            header(),
            Row::from_texts(&["", "", "АБ"]),
            Row::from_texts(&["1", "A", "+"]),
            sentinel(),
            Row::from_texts(&["no header here"]),
        ];
        assert_eq!(scan_blocks(&rows), scan_blocks(&rows));
    }

    #[test]
    fn rows_before_first_sentinel_are_ignored() {
        let rows = vec![
            header(),
            Row::from_texts(&["", "", "АБ"]),
            Row::from_texts(&["0", "ignored", "+"]),
            sentinel(),
            header(),
            Row::from_texts(&["", "", "АБ"]),
            Row::from_texts(&["1", "A", "+"]),
        ];
        let blocks = scan_blocks(&rows);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start_row, 3);
        assert_eq!(blocks[0].data_rows, vec![Row::from_texts(&["1", "A", "+"])]);
    }
}

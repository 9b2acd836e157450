/// Specialization (program-of-study) detection.
///
/// The column holding a candidate's program choices moves between export
/// variants, so it is found by content: the first cell whose text contains
/// both the separator and a line break. Each line of that cell is one
/// choice in priority order, formatted `"<specialization> - <institution>"`.
///
/// Both the detector and the line parser live here so the heuristic can be
/// swapped for a header lookup without touching the aggregator.
use crate::error::RowError;
use crate::model::{Cell, Row};
use crate::vocabulary::SPECIALIZATION_SEPARATOR;

/// A parsed first-choice entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice<'a> {
    pub specialization: &'a str,
    pub institution_code: &'a str,
}

/// `true` if `cell` looks like a multi-line list of program choices.
#[inline]
pub fn is_specialization_cell(cell: &Cell) -> bool {
    cell.as_text()
        .is_some_and(|s| s.contains(SPECIALIZATION_SEPARATOR) && s.contains('\n'))
}

/// Text of the first cell in `row` that passes [`is_specialization_cell`].
pub fn find_specialization_cell(row: &Row) -> Option<&str> {
    row.cells()
        .iter()
        .find(|c| is_specialization_cell(c))
        .and_then(Cell::as_text)
}

/// Parse the first line of `text` that contains the separator.
///
/// Later lines are lower-priority choices and are never considered.
/// Returns `Ok(None)` when no trimmed line carries the separator, and an
/// error when the first such line does not split into exactly two parts.
pub fn first_choice(text: &str) -> Result<Option<Choice<'_>>, RowError> {
    let Some(line) = text
        .split('\n')
        .map(str::trim)
        .find(|line| line.contains(SPECIALIZATION_SEPARATOR))
    else {
        return Ok(None);
    };

    let parts: Vec<&str> = line.split(SPECIALIZATION_SEPARATOR).collect();
    match parts.as_slice() {
        [specialization, institution_code] => Ok(Some(Choice {
            specialization: specialization.trim(),
            institution_code: institution_code.trim(),
        })),
        _ => Err(RowError::MalformedSpecialization { parts: parts.len() }),
    }
}

/// Worksheet cells and rows.
///
/// Rows are positional: a cell has no name of its own. Meaning is assigned
/// later by looking up column indices in the header and category rows of the
/// block the row belongs to.
use compact_str::{format_compact, CompactString, ToCompactString};
use serde::Serialize;

/// A single cell value as loaded from the worksheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Absent or empty cell.
    Empty,
    Text(CompactString),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Build a text cell.
    pub fn text(s: &str) -> Self {
        Self::Text(CompactString::new(s))
    }

    /// `true` for empty cells and empty strings.
    ///
    /// Whitespace-only text is *not* blank: it is still content in the
    /// source sheet.
    #[inline]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Borrow the text payload, if this is a text cell.
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Stringified value used for every label and marker comparison.
    ///
    /// Integral numbers print without a fractional part so an ID stored as
    /// a number (`123456789012.0`) stringifies the same as one stored as text.
    pub fn to_text(&self) -> CompactString {
        match self {
            Self::Empty => CompactString::default(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(true) => CompactString::const_new("True"),
            Self::Bool(false) => CompactString::const_new("False"),
        }
    }

    /// `true` if the stringified value, trimmed, equals `label`.
    #[inline]
    pub fn matches_label(&self, label: &str) -> bool {
        match self {
            Self::Text(s) => s.trim() == label,
            Self::Empty => false,
            other => other.to_text().trim() == label,
        }
    }
}

fn format_number(n: f64) -> CompactString {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format_compact!("{}", n as i64)
    } else {
        n.to_compact_string()
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::text(s)
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Option<&str>> for Cell {
    fn from(s: Option<&str>) -> Self {
        s.map(Cell::from).unwrap_or(Cell::Empty)
    }
}

/// One worksheet row: an ordered sequence of cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(pub Vec<Cell>);

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self(cells)
    }

    /// Build a row from string literals; `""` becomes an empty cell.
    pub fn from_texts(cells: &[&str]) -> Self {
        Self(cells.iter().map(|&s| Cell::from(s)).collect())
    }

    /// `true` if every cell is blank (including a row with no cells).
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(Cell::is_blank)
    }

    /// Cell at `idx`, or `None` when the row is shorter.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Cell> {
        self.0.get(idx)
    }

    /// Stringified cell at `idx`; out-of-range reads as an empty string.
    pub fn text_at(&self, idx: usize) -> CompactString {
        self.get(idx).map(Cell::to_text).unwrap_or_default()
    }

    /// Index of the first cell whose trimmed text equals `label`.
    pub fn position_of(&self, label: &str) -> Option<usize> {
        self.0.iter().position(|c| c.matches_label(label))
    }

    /// Index of the first text cell equal to `label`, untrimmed.
    pub fn position_exact(&self, label: &str) -> Option<usize> {
        self.0.iter().position(|c| c.as_text() == Some(label))
    }

    /// `true` if any cell's stringified value contains `needle`.
    pub fn any_contains(&self, needle: &str) -> bool {
        self.0.iter().any(|c| match c {
            Cell::Text(s) => s.contains(needle),
            Cell::Empty => false,
            other => other.to_text().contains(needle),
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.0
    }
}

impl FromIterator<Cell> for Row {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

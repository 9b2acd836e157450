/// Error types for file processing.
///
/// Callers branch on the class of failure: a *duplicate* upload is a
/// different outcome from an *invalid* one, so the two are kept as distinct
/// variants with classifier helpers instead of being folded into a message.
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessError>;

/// File-level failures. Each one rejects the whole file; no partial report
/// is produced.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The file is not an `.xlsx` workbook.
    #[error("Not an Excel file: {path} (expected .xlsx)")]
    Format { path: PathBuf },

    /// Right file type, but no block in it has the expected header layout.
    #[error("File does not match expected NCT pattern: {path}")]
    SchemaMismatch { path: PathBuf },

    /// Identical content was processed within the dedup window.
    #[error(
        "Duplicate file: identical content was already processed in the last {window_hours} hours (retry in {}m)",
        .remaining.as_secs().div_ceil(60)
    )]
    DuplicateFile {
        window_hours: u32,
        remaining: Duration,
    },

    /// Identical content is being processed by another caller right now.
    #[error("Duplicate file: identical content is currently being processed")]
    DuplicateInFlight,

    #[error("IO error: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The workbook could not be opened or has no worksheet.
    #[error("Cannot read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),

    /// Processing was cancelled by the caller between rows.
    #[error("Processing cancelled")]
    Cancelled,
}

impl ProcessError {
    /// `true` for both duplicate variants.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateFile { .. } | Self::DuplicateInFlight)
    }

    /// `true` when the file itself is unacceptable (wrong type, wrong
    /// layout, unreadable workbook).
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            Self::Format { .. } | Self::SchemaMismatch { .. } | Self::Workbook { .. }
        )
    }
}

/// Row-level soft failures. A failing row is skipped and counted; it never
/// aborts the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// The first-choice line split on the separator into other than two parts.
    #[error("malformed specialization entry: expected 2 parts, found {parts}")]
    MalformedSpecialization { parts: usize },
}

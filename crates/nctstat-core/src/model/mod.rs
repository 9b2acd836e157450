/// Data model for worksheets, blocks and reports.
///
/// Rows and blocks are produced by the scanner and read by the aggregator;
/// the report is the only value handed back to callers.
pub mod block;
pub mod cell;
pub mod report;

pub use block::Block;
pub use cell::{Cell, Row};
pub use report::{QuotaCounts, Report, ReportMetadata};

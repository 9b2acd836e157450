/// Analysis modules — turn scanned blocks into a report.

pub mod aggregator;
pub mod specialization;

pub use aggregator::{evaluate_row, BlockColumns, ReportAggregator, RowTally};
pub use specialization::{find_specialization_cell, first_choice, is_specialization_cell, Choice};

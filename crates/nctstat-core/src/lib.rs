/// nctstat core — block scanning, report aggregation, and deduplication.
///
/// This crate contains all processing logic with no CLI dependencies.
/// A service embedding it constructs one [`Pipeline`] and shares it, so
/// the dedup caches persist across files.
///
/// # Modules
///
/// - [`scanner`] — Splits a worksheet into NCT blocks; loads `.xlsx` rows.
/// - [`analysis`] — Quota, annotation and specialization tallies.
/// - [`dedup`] — Time-windowed digest caches for files and rows.
/// - [`pipeline`] — Format check, scan, aggregate, register; background runs.
/// - [`model`] — Cells, rows, blocks and the report.
/// - [`export`] — JSON and CSV rendering of a report.
pub mod analysis;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod scanner;
pub mod vocabulary;

pub use config::{CacheConfig, PipelineConfig};
pub use error::{ProcessError, Result};
pub use model::Report;
pub use pipeline::progress::{ProcessProgress, Stage};
pub use pipeline::{start_processing, Pipeline, ProcessHandle};

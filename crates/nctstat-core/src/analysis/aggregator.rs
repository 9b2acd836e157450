/// Report aggregation — walks scanned blocks and tallies quota flags,
/// annotations and first-choice specializations.
///
/// Rows are deduplicated by identity digest against the shared row cache
/// before anything is counted. A row whose digest is recent contributes to
/// nothing except `duplicate_rows_skipped`.
///
/// Each row is evaluated into a [`RowTally`] first and only then committed
/// to the report, so a row that fails halfway leaves no partial counts.
/// Digests recorded before a failure or cancellation are not rolled back:
/// the cache is best-effort, not transactional.
use super::specialization::{find_specialization_cell, first_choice};
use crate::dedup::{HashCache, IdentityColumns};
use crate::error::{ProcessError, Result, RowError};
use crate::model::{Block, Cell, Report, Row};
use crate::vocabulary::{QuotaCategory, ANNOTATION_LABELS, QUOTA_FLAG, TARGET_INSTITUTION_CODE};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Column lookups resolved once per block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockColumns {
    /// Every `(category, column)` pair whose category-row cell equals the
    /// category label. A label may appear in several columns.
    pub quota: Vec<(QuotaCategory, usize)>,
    pub annotation: Option<usize>,
    pub identity: IdentityColumns,
}

impl BlockColumns {
    pub fn resolve(block: &Block) -> Self {
        let quota = block
            .category_row
            .cells()
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| {
                cell.as_text()
                    .and_then(QuotaCategory::from_label)
                    .map(|cat| (cat, idx))
            })
            .collect();

        let annotation = ANNOTATION_LABELS
            .iter()
            .find_map(|label| block.header_row.position_exact(label));

        Self {
            quota,
            annotation,
            identity: IdentityColumns::resolve(&block.header_row),
        }
    }
}

/// Everything one row contributes, before it is committed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RowTally<'r> {
    pub quotas: Vec<QuotaCategory>,
    pub annotations: Vec<&'r str>,
    /// First-choice specialization, only when it targets the configured
    /// institution.
    pub specialization: Option<&'r str>,
}

/// Evaluate one (non-duplicate) row against its block's columns.
pub fn evaluate_row<'r>(
    row: &'r Row,
    columns: &BlockColumns,
    target_code: &str,
) -> std::result::Result<RowTally<'r>, RowError> {
    let mut tally = RowTally::default();

    for &(category, idx) in &columns.quota {
        if row.get(idx).is_some_and(is_quota_flag) {
            tally.quotas.push(category);
        }
    }

    if let Some(text) = columns
        .annotation
        .and_then(|idx| row.get(idx))
        .and_then(Cell::as_text)
    {
        tally.annotations.extend(
            text.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty()),
        );
    }

    if let Some(text) = find_specialization_cell(row) {
        if let Some(choice) = first_choice(text)? {
            if choice.institution_code == target_code {
                tally.specialization = Some(choice.specialization);
            }
        }
    }

    Ok(tally)
}

#[inline]
fn is_quota_flag(cell: &Cell) -> bool {
    cell.as_text().is_some_and(|s| s.trim() == QUOTA_FLAG)
}

/// Builds a [`Report`] from scanned blocks.
pub struct ReportAggregator<'a> {
    row_cache: &'a HashCache,
    target_code: &'a str,
    cancel_flag: Option<&'a AtomicBool>,
}

impl<'a> ReportAggregator<'a> {
    pub fn new(row_cache: &'a HashCache) -> Self {
        Self {
            row_cache,
            target_code: TARGET_INSTITUTION_CODE,
            cancel_flag: None,
        }
    }

    /// Count specializations for `code` instead of the default institution.
    pub fn with_target_code(mut self, code: &'a str) -> Self {
        self.target_code = code;
        self
    }

    /// Check `flag` between rows and stop with [`ProcessError::Cancelled`]
    /// once it is set.
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn aggregate(&self, blocks: &[Block]) -> Result<Report> {
        let mut report = Report::new(Utc::now());

        for (block_idx, block) in blocks.iter().enumerate() {
            let columns = BlockColumns::resolve(block);
            if columns.annotation.is_none() {
                debug!("Block {block_idx}: no annotation column");
            }
            if !IdentityColumns::all_named(&block.header_row) {
                debug!(
                    "Block {block_idx}: identity columns not all named, using fallback positions"
                );
            }

            for (row_idx, row) in block.data_rows.iter().enumerate() {
                if self.is_cancelled() {
                    info!(
                        "Aggregation cancelled at block {block_idx}, row {row_idx} ({} rows seen)",
                        report.metadata.total_rows_processed
                    );
                    return Err(ProcessError::Cancelled);
                }
                self.process_row(&mut report, row, &columns, block_idx, row_idx);
            }

            report.metadata.blocks_processed += 1;
        }

        report.metadata.row_cache = Some(self.row_cache.stats());
        report.metadata.finish(Utc::now());

        let meta = &report.metadata;
        info!(
            "Aggregated {} blocks: {} rows ({} unique, {} duplicate, {} failed) in {:.3}s",
            meta.blocks_processed,
            meta.total_rows_processed,
            meta.unique_rows_processed,
            meta.duplicate_rows_skipped,
            meta.rows_failed,
            meta.duration_seconds
        );
        Ok(report)
    }

    fn process_row(
        &self,
        report: &mut Report,
        row: &Row,
        columns: &BlockColumns,
        block_idx: usize,
        row_idx: usize,
    ) {
        report.metadata.total_rows_processed += 1;

        let digest = columns.identity.digest(row);
        if !self.row_cache.record_if_new(digest) {
            report.metadata.duplicate_rows_skipped += 1;
            return;
        }

        let tally = match evaluate_row(row, columns, self.target_code) {
            Ok(tally) => tally,
            Err(err) => {
                // Position only: the row holds personal data.
                warn!("Skipping block {block_idx}, row {row_idx}: {err}");
                report.metadata.rows_failed += 1;
                return;
            }
        };

        let meta = &mut report.metadata;
        meta.unique_rows_processed += 1;
        if !tally.quotas.is_empty() {
            meta.rows_with_quotas += 1;
            for category in tally.quotas {
                report.quota_counts.increment(category);
            }
        }
        if !tally.annotations.is_empty() {
            meta.rows_with_annotation += 1;
            for item in tally.annotations {
                report.quota_counts.add_annotation(item);
            }
        }
        if let Some(name) = tally.specialization {
            meta.rows_with_specializations += 1;
            *report
                .specialization_counts
                .entry(name.to_owned())
                .or_insert(0) += 1;
        }
    }
}

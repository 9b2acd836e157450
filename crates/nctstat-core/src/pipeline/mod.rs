/// File processing pipeline — format check, scan, aggregate, register.
///
/// ```text
/// bytes ─► extension check ─► file digest claim ─► load rows ─► scan blocks
///       ─► schema check ─► aggregate (row dedup) ─► commit file digest ─► Report
/// ```
///
/// # File-level dedup ordering
///
/// The file digest is *claimed* before any work starts and *recorded* only
/// after aggregation succeeds. A claim blocks concurrent runs of identical
/// bytes; dropping the claim on any failure path leaves the cache untouched,
/// so a failed run never marks a file as seen. Callers that persist uploads
/// should call [`Pipeline::precheck`] on the just-received bytes before
/// storing anything.
pub mod progress;

use crate::analysis::ReportAggregator;
use crate::config::PipelineConfig;
use crate::dedup::{compute_digest, Admission, Digest, HashCache};
use crate::error::{ProcessError, Result};
use crate::model::{Report, Row};
use crate::scanner::{self, workbook};
use crate::vocabulary::EXPECTED_EXTENSION;
use crossbeam_channel::{Receiver, Sender};
use progress::{ProcessProgress, Stage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Maximum number of progress messages that may queue up in the channel.
///
/// A run emits at most a handful of messages, so this never applies
/// back-pressure in practice.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// `true` if `path` has the `.xlsx` extension (any case).
pub fn is_xlsx_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(EXPECTED_EXTENSION))
}

/// Holds a file digest as in-flight until committed or dropped.
struct FileClaim<'a> {
    cache: &'a HashCache,
    digest: Digest,
    committed: bool,
}

impl FileClaim<'_> {
    fn commit(mut self) {
        self.cache.commit(self.digest);
        self.committed = true;
    }
}

impl Drop for FileClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.cache.release(&self.digest);
        }
    }
}

/// The processing entry point. Construct once per service and share it
/// (e.g. behind an `Arc`); the dedup caches live as long as it does.
pub struct Pipeline {
    config: PipelineConfig,
    file_cache: Arc<HashCache>,
    row_cache: Arc<HashCache>,
}

impl Pipeline {
    /// Build a pipeline with fresh caches sized from `config`.
    pub fn new(config: PipelineConfig) -> Self {
        let file_cache = Arc::new(HashCache::from_config("files", &config.file_cache));
        let row_cache = Arc::new(HashCache::from_config("rows", &config.row_cache));
        Self::with_caches(config, file_cache, row_cache)
    }

    /// Build a pipeline over existing caches.
    pub fn with_caches(
        config: PipelineConfig,
        file_cache: Arc<HashCache>,
        row_cache: Arc<HashCache>,
    ) -> Self {
        Self {
            config,
            file_cache,
            row_cache,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn file_cache(&self) -> &Arc<HashCache> {
        &self.file_cache
    }

    pub fn row_cache(&self) -> &Arc<HashCache> {
        &self.row_cache
    }

    /// Reject `bytes` if identical content was processed within the window
    /// or is being processed right now.
    ///
    /// Does not claim or record anything. Returns the file digest so the
    /// caller can log or store it.
    pub fn precheck(&self, bytes: &[u8]) -> Result<Digest> {
        let digest = compute_digest(bytes);
        match self.file_cache.check(&digest) {
            None => Ok(digest),
            Some(Admission::Recent { remaining }) => Err(self.duplicate(remaining)),
            Some(_) => Err(ProcessError::DuplicateInFlight),
        }
    }

    /// Process the workbook at `path`.
    pub fn process(&self, path: &Path) -> Result<Report> {
        self.run(path, None, None)
    }

    /// Like [`Pipeline::process`], stopping with [`ProcessError::Cancelled`]
    /// once `cancel_flag` is set.
    pub fn process_with_cancel(&self, path: &Path, cancel_flag: &AtomicBool) -> Result<Report> {
        self.run(path, Some(cancel_flag), None)
    }

    /// Process rows the caller already loaded from `bytes`.
    ///
    /// `source` is used for the extension check and the report's file name;
    /// it is never opened.
    pub fn process_worksheet(
        &self,
        source: &Path,
        bytes: &[u8],
        rows: &[Row],
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<Report> {
        check_extension(source)?;
        let claim = self.claim(bytes)?;
        self.finish(source, claim, rows, cancel_flag, None)
    }

    fn run(
        &self,
        path: &Path,
        cancel_flag: Option<&AtomicBool>,
        progress: Option<&Sender<ProcessProgress>>,
    ) -> Result<Report> {
        info!("Processing {}", path.display());
        check_extension(path)?;

        notify(progress, ProcessProgress::Stage(Stage::Reading));
        let bytes = std::fs::read(path).map_err(|source| ProcessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let claim = self.claim(&bytes)?;

        notify(progress, ProcessProgress::Stage(Stage::Loading));
        let rows = workbook::load_rows(&bytes).map_err(|e| ProcessError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!("Loaded {} rows from {}", rows.len(), path.display());

        self.finish(path, claim, &rows, cancel_flag, progress)
    }

    fn claim(&self, bytes: &[u8]) -> Result<FileClaim<'_>> {
        let digest = compute_digest(bytes);
        match self.file_cache.try_claim(digest) {
            Admission::Claimed => Ok(FileClaim {
                cache: &self.file_cache,
                digest,
                committed: false,
            }),
            Admission::Recent { remaining } => {
                info!("Rejecting duplicate file {digest}");
                Err(self.duplicate(remaining))
            }
            Admission::InFlight => {
                info!("Rejecting file {digest}: identical content already in progress");
                Err(ProcessError::DuplicateInFlight)
            }
        }
    }

    fn duplicate(&self, remaining: std::time::Duration) -> ProcessError {
        ProcessError::DuplicateFile {
            window_hours: self.file_cache.window_hours(),
            remaining,
        }
    }

    /// Scan, check the schema, aggregate, then register the file.
    fn finish(
        &self,
        source: &Path,
        claim: FileClaim<'_>,
        rows: &[Row],
        cancel_flag: Option<&AtomicBool>,
        progress: Option<&Sender<ProcessProgress>>,
    ) -> Result<Report> {
        notify(progress, ProcessProgress::Stage(Stage::Scanning));
        let blocks = scanner::scan_blocks(rows);
        let with_schema = blocks.iter().filter(|b| b.has_schema()).count();
        notify(
            progress,
            ProcessProgress::BlocksScanned {
                blocks: blocks.len(),
                with_schema,
                data_rows: blocks.iter().map(|b| b.data_rows.len()).sum(),
            },
        );
        if with_schema == 0 {
            warn!(
                "{}: {} blocks, none with a category row",
                source.display(),
                blocks.len()
            );
            return Err(ProcessError::SchemaMismatch {
                path: source.to_path_buf(),
            });
        }

        notify(progress, ProcessProgress::Stage(Stage::Aggregating));
        let mut aggregator = ReportAggregator::new(&self.row_cache)
            .with_target_code(&self.config.target_institution_code);
        if let Some(flag) = cancel_flag {
            aggregator = aggregator.with_cancel_flag(flag);
        }
        let mut report = aggregator.aggregate(&blocks)?;

        let digest = claim.digest;
        claim.commit();

        let meta = &mut report.metadata;
        meta.file_cache = Some(self.file_cache.stats());
        meta.file_digest = Some(digest.to_hex());
        meta.source_file = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        info!(
            "Processed {}: {} blocks, {} rows",
            source.display(),
            meta.blocks_processed,
            meta.total_rows_processed
        );
        Ok(report)
    }
}

fn check_extension(path: &Path) -> Result<()> {
    if is_xlsx_path(path) {
        Ok(())
    } else {
        Err(ProcessError::Format {
            path: path.to_path_buf(),
        })
    }
}

#[inline]
fn notify(progress: Option<&Sender<ProcessProgress>>, msg: ProcessProgress) {
    if let Some(tx) = progress {
        let _ = tx.send(msg);
    }
}

/// Handle to a pipeline run on a background thread. Allows cancellation
/// and receiving progress updates.
pub struct ProcessHandle {
    /// Receiver for progress updates; the last message is always terminal.
    pub progress_rx: Receiver<ProcessProgress>,
    cancel_flag: Arc<AtomicBool>,
    _thread: Option<thread::JoinHandle<()>>,
}

impl ProcessHandle {
    /// Request processing to stop at the next row boundary.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

/// Process `path` on a background thread.
///
/// The caller bounds how long it waits and calls [`ProcessHandle::cancel`]
/// on timeout; the pipeline itself imposes no deadline.
pub fn start_processing(pipeline: Arc<Pipeline>, path: PathBuf) -> ProcessHandle {
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<ProcessProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel_flag.clone();

    let thread = thread::Builder::new()
        .name("nctstat-pipeline".into())
        .spawn(move || {
            let start = Instant::now();
            let result = pipeline.run(&path, Some(cancel_clone.as_ref()), Some(&progress_tx));
            let msg = match result {
                Ok(report) => ProcessProgress::Complete {
                    report: Box::new(report),
                    duration: start.elapsed(),
                },
                Err(ProcessError::Cancelled) => ProcessProgress::Cancelled,
                Err(err) => ProcessProgress::Failed(err),
            };
            let _ = progress_tx.send(msg);
        })
        .expect("failed to spawn pipeline thread");

    ProcessHandle {
        progress_rx,
        cancel_flag,
        _thread: Some(thread),
    }
}

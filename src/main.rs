//! nctstat — quota and specialization statistics for NCT applicant lists.
//!
//! Thin binary entry point. All logic lives in the `nctstat-core` crate.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use nctstat_core::export::{self, ExportFormat};
use nctstat_core::{start_processing, Pipeline, PipelineConfig, ProcessProgress, Report};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => ExportFormat::Json,
            Format::Csv => ExportFormat::Csv,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "nctstat", version, about = "Aggregate NCT applicant spreadsheets into quota reports")]
struct Cli {
    /// `.xlsx` files to process, in order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON config file overriding cache limits and the institution code.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "json")]
    format: Format,

    /// Write `<stem>.report.<ext>` files here instead of printing to stdout.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Cancel a file that takes longer than this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialise structured logging on stderr; stdout carries reports.
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let pipeline = Arc::new(Pipeline::new(config));
    let timeout = cli.timeout_secs.map(Duration::from_secs);
    let format = ExportFormat::from(cli.format);

    let mut failed = 0usize;
    for path in &cli.files {
        match run_one(&pipeline, path, timeout) {
            Ok(report) => emit(&report, path, format, cli.output_dir.as_deref())?,
            Err(err) => {
                failed += 1;
                tracing::error!("{}: {err:#}", path.display());
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} files failed", cli.files.len());
    }
    Ok(())
}

/// Process one file on a background thread, cancelling it past `timeout`.
fn run_one(
    pipeline: &Arc<Pipeline>,
    path: &Path,
    timeout: Option<Duration>,
) -> anyhow::Result<Report> {
    let handle = start_processing(Arc::clone(pipeline), path.to_path_buf());
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        let msg = match deadline {
            Some(deadline) if !handle.is_cancelled() => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match handle.progress_rx.recv_timeout(wait) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => {
                        tracing::warn!("{}: timed out, cancelling", path.display());
                        handle.cancel();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        bail!("processing thread exited without a result")
                    }
                }
            }
            _ => handle
                .progress_rx
                .recv()
                .context("processing thread exited without a result")?,
        };

        match msg {
            ProcessProgress::Stage(stage) => tracing::debug!("{}: {}", path.display(), stage.label()),
            ProcessProgress::BlocksScanned {
                blocks,
                with_schema,
                data_rows,
            } => tracing::debug!(
                "{}: {blocks} blocks ({with_schema} with categories), {data_rows} data rows",
                path.display()
            ),
            ProcessProgress::Complete { report, duration } => {
                tracing::info!("{}: done in {:.2?}", path.display(), duration);
                return Ok(*report);
            }
            ProcessProgress::Failed(err) => return Err(err.into()),
            ProcessProgress::Cancelled => bail!("cancelled after timeout"),
        }
    }
}

fn emit(
    report: &Report,
    source: &Path,
    format: ExportFormat,
    output_dir: Option<&Path>,
) -> anyhow::Result<()> {
    match output_dir {
        Some(dir) => {
            let out = export::report_path(dir, source, format);
            export::write_report(report, &out, format)?;
            tracing::info!("Wrote {}", out.display());
        }
        None => match format {
            ExportFormat::Json => println!("{}", export::to_json(report)?),
            ExportFormat::Csv => export::write_csv(report, std::io::stdout().lock())?,
        },
    }
    Ok(())
}

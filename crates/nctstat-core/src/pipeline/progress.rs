/// Progress reporting — lightweight messages sent from a processing thread
/// to its caller via a crossbeam channel.
use crate::error::ProcessError;
use crate::model::Report;
use std::time::Duration;

/// Pipeline stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading raw bytes and checking the file-level dedup cache.
    Reading,
    /// Decoding the workbook into rows.
    Loading,
    Scanning,
    Aggregating,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Loading => "loading workbook",
            Self::Scanning => "scanning blocks",
            Self::Aggregating => "aggregating",
        }
    }
}

#[derive(Debug)]
pub enum ProcessProgress {
    /// A new stage started.
    Stage(Stage),
    /// Block scan finished.
    BlocksScanned {
        blocks: usize,
        with_schema: usize,
        data_rows: usize,
    },
    /// The report is ready and the file is registered as seen.
    Complete {
        report: Box<Report>,
        duration: Duration,
    },
    /// Processing failed; the file was not registered.
    Failed(ProcessError),
    /// Processing was cancelled by the caller.
    Cancelled,
}

impl ProcessProgress {
    /// `true` for the three messages that end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete { .. } | Self::Failed(_) | Self::Cancelled
        )
    }
}

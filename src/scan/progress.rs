use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::audio::SegmentCounter;

use super::verdict::ScanVerdict;

/// Per-file stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Probing,
    CheckingCorruption,
    CheckingTruncation,
    DetectingSilence,
    AnalyzingChapters,
    Complete,
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPhase::Probing => write!(f, "Probing"),
            ScanPhase::CheckingCorruption => write!(f, "Checking corruption"),
            ScanPhase::CheckingTruncation => write!(f, "Checking truncation"),
            ScanPhase::DetectingSilence => write!(f, "Detecting silence"),
            ScanPhase::AnalyzingChapters => write!(f, "Analyzing chapters"),
            ScanPhase::Complete => write!(f, "Complete"),
        }
    }
}

/// Running totals across a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTotals {
    pub completed: usize,
    pub total: usize,
    pub with_issues: usize,
}

/// Informational progress for callers. Never feeds back into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanProgressEvent {
    Phase {
        path: PathBuf,
        phase: ScanPhase,
        /// Fraction of this file's work done, 0.0 to 1.0.
        progress: f64,
        segment: Option<SegmentCounter>,
        duration: Option<Duration>,
    },
    FileCompleted {
        verdict: ScanVerdict,
        totals: ScanTotals,
    },
}

/// Emits phase events for one file onto an optional channel.
///
/// Every event is sent with backpressure: a slow reader stalls the scan
/// rather than losing events. A closed receiver is ignored.
pub(crate) struct PhaseReporter<'a> {
    path: &'a Path,
    sender: Option<&'a mpsc::Sender<ScanProgressEvent>>,
    duration: Option<Duration>,
}

impl<'a> PhaseReporter<'a> {
    pub(crate) fn new(path: &'a Path, sender: Option<&'a mpsc::Sender<ScanProgressEvent>>) -> Self {
        Self {
            path,
            sender,
            duration: None,
        }
    }

    pub(crate) fn set_duration(&mut self, duration: Option<Duration>) {
        self.duration = duration;
    }

    pub(crate) async fn phase(&self, phase: ScanPhase, progress: f64) {
        self.send(phase, progress, None).await;
    }

    /// Progress within `[from, to)` for one segment of a multi-pass phase.
    pub(crate) async fn segment(&self, phase: ScanPhase, from: f64, to: f64, segment: SegmentCounter) {
        let done = segment.current.saturating_sub(1) as f64 / segment.total.max(1) as f64;
        self.send(phase, from + (to - from) * done, Some(segment)).await;
    }

    async fn send(&self, phase: ScanPhase, progress: f64, segment: Option<SegmentCounter>) {
        let Some(sender) = self.sender else {
            return;
        };
        let event = ScanProgressEvent::Phase {
            path: self.path.to_path_buf(),
            phase,
            progress: progress.clamp(0.0, 1.0),
            segment,
            duration: self.duration,
        };
        if sender.send(event).await.is_err() {
            debug!("Progress receiver closed for {}", self.path.display());
        }
    }
}

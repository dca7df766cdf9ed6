pub mod backend;
pub mod corruption;
pub mod probe;
pub mod silence;
pub mod tool;
pub mod truncation;

pub use backend::{FfmpegTool, MediaTool};
pub use corruption::{check_corruption, classify_diagnostics, plan_corruption_sweep, probe_segment};
pub use probe::{parse_probe_output, probe};
pub use silence::{
    dedupe_intervals, parse_silence_output, plan_silence_sweep, survey, SilenceOptions,
};
pub use tool::{ToolCommand, ToolOutput};
pub use truncation::{has_audio_at, locate, TruncationReport};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stream and container metadata gathered once per file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    pub has_audio_stream: bool,
    pub codec: Option<String>,
    pub bitrate_bps: Option<u64>,
    pub sample_rate_hz: Option<u32>,
    /// Container duration; `None` when missing or unparseable.
    pub duration: Option<Duration>,
    pub chapters: Vec<Chapter>,
}

impl MediaProbe {
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.map(|d| d.as_secs_f64())
    }
}

/// An entry of the embedded chapter table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// 0-based position in source order.
    pub index: usize,
    pub title: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// A run of audio below the silence threshold, in absolute file time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceInterval {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub duration_seconds: f64,
}

impl SilenceInterval {
    /// Shift window-local timestamps by the window's absolute offset.
    pub fn offset_by(self, seconds: f64) -> Self {
        Self {
            start_seconds: self.start_seconds + seconds,
            end_seconds: self.end_seconds + seconds,
            duration_seconds: self.duration_seconds,
        }
    }
}

/// A bounded time range of a file examined on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleWindow {
    pub start_seconds: f64,
    pub length_seconds: f64,
}

impl SampleWindow {
    pub fn new(start_seconds: f64, length_seconds: f64) -> Self {
        Self {
            start_seconds,
            length_seconds,
        }
    }

    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.length_seconds
    }
}

/// Which parts of a file a decode sweep touches.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepPlan {
    /// One pass over the entire file.
    WholeFile,
    /// Independent passes over these windows, in order.
    Windows(Vec<SampleWindow>),
}

impl SweepPlan {
    /// Number of tool invocations the plan needs.
    pub fn len(&self) -> usize {
        match self {
            SweepPlan::WholeFile => 1,
            SweepPlan::Windows(windows) => windows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Each pass as an optional window; `None` means the whole file.
    pub fn passes(&self) -> Vec<Option<SampleWindow>> {
        match self {
            SweepPlan::WholeFile => vec![None],
            SweepPlan::Windows(windows) => windows.iter().copied().map(Some).collect(),
        }
    }
}

/// Position within a multi-pass phase, reported as "current/total".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCounter {
    pub current: usize,
    pub total: usize,
}

impl std::fmt::Display for SegmentCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.current, self.total)
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::{MediaProbe, SilenceInterval};

use super::chapters::ChapterSilenceFinding;

/// The single reported outcome of a file, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Error,
    MissingAudio,
    Corrupt,
    Truncated,
    ChapterSilence,
    Silence,
    Ok,
}

impl ScanStatus {
    pub fn is_issue(&self) -> bool {
        *self != ScanStatus::Ok
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Error => write!(f, "error"),
            ScanStatus::MissingAudio => write!(f, "missing audio"),
            ScanStatus::Corrupt => write!(f, "corrupt"),
            ScanStatus::Truncated => write!(f, "truncated"),
            ScanStatus::ChapterSilence => write!(f, "chapter silence"),
            ScanStatus::Silence => write!(f, "long silence"),
            ScanStatus::Ok => write!(f, "ok"),
        }
    }
}

type StatusRule = (fn(&ScanVerdict) -> bool, ScanStatus);

fn has_error(v: &ScanVerdict) -> bool {
    v.error.is_some()
}

fn lacks_audio(v: &ScanVerdict) -> bool {
    !v.has_audio_stream
}

fn is_corrupt(v: &ScanVerdict) -> bool {
    v.is_corrupt
}

fn is_truncated(v: &ScanVerdict) -> bool {
    v.is_truncated
}

fn has_chapter_silence(v: &ScanVerdict) -> bool {
    !v.chapter_silence_findings.is_empty()
}

fn has_silence(v: &ScanVerdict) -> bool {
    !v.silence_intervals.is_empty()
}

/// Evaluated top to bottom; the first matching rule decides the status.
const STATUS_RULES: &[StatusRule] = &[
    (has_error, ScanStatus::Error),
    (lacks_audio, ScanStatus::MissingAudio),
    (is_corrupt, ScanStatus::Corrupt),
    (is_truncated, ScanStatus::Truncated),
    (has_chapter_silence, ScanStatus::ChapterSilence),
    (has_silence, ScanStatus::Silence),
];

/// Aggregated diagnostics for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub path: PathBuf,
    pub file_name: String,
    pub has_audio_stream: bool,
    pub is_corrupt: bool,
    pub is_truncated: bool,
    pub claimed_duration: Option<Duration>,
    /// Only meaningful when `is_truncated`.
    pub actual_duration: Option<Duration>,
    pub silence_intervals: Vec<SilenceInterval>,
    pub chapter_silence_findings: Vec<ChapterSilenceFinding>,
    pub codec: Option<String>,
    pub bitrate_bps: Option<u64>,
    pub sample_rate_hz: Option<u32>,
    pub error: Option<String>,
}

impl ScanVerdict {
    /// Empty verdict for `path` with no findings and no audio recorded yet.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            has_audio_stream: false,
            is_corrupt: false,
            is_truncated: false,
            claimed_duration: None,
            actual_duration: None,
            silence_intervals: Vec::new(),
            chapter_silence_findings: Vec::new(),
            codec: None,
            bitrate_bps: None,
            sample_rate_hz: None,
            error: None,
        }
    }

    /// Verdict carrying the metadata gathered by the probe.
    pub fn from_probe(path: &Path, probe: &MediaProbe) -> Self {
        Self {
            has_audio_stream: probe.has_audio_stream,
            claimed_duration: probe.duration,
            actual_duration: probe.duration,
            codec: probe.codec.clone(),
            bitrate_bps: probe.bitrate_bps,
            sample_rate_hz: probe.sample_rate_hz,
            ..Self::new(path)
        }
    }

    pub fn failed(path: &Path, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(path)
        }
    }

    pub fn status(&self) -> ScanStatus {
        STATUS_RULES
            .iter()
            .find(|(applies, _)| applies(self))
            .map(|(_, status)| *status)
            .unwrap_or(ScanStatus::Ok)
    }

    pub fn is_clean(&self) -> bool {
        self.has_audio_stream
            && !self.is_corrupt
            && !self.is_truncated
            && self.silence_intervals.is_empty()
            && self.chapter_silence_findings.is_empty()
            && self.error.is_none()
    }

    pub fn has_long_silence(&self) -> bool {
        !self.silence_intervals.is_empty()
    }

    /// Longest detected silence, if any.
    pub fn longest_silence(&self) -> Option<&SilenceInterval> {
        self.silence_intervals
            .iter()
            .max_by(|a, b| a.duration_seconds.total_cmp(&b.duration_seconds))
    }
}

//! Silence surveyor: silencedetect passes, marker parsing and window merging.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ScanMode;
use crate::error::{Result, ScanError};

use super::backend::MediaTool;
use super::{Chapter, SampleWindow, SegmentCounter, SilenceInterval, SweepPlan};

/// Files shorter than this get one whole-file silence pass.
pub const SILENCE_FULL_SWEEP_MAX_SECS: f64 = 1800.0;

/// Length of each sampled silence window.
pub const SILENCE_WINDOW_SECS: f64 = 120.0;

/// Chapter windows start this far ahead of the chapter.
pub const CHAPTER_LEAD_IN_SECS: f64 = 60.0;

/// Intervals starting within this gap of the previous one are duplicates.
pub const DEDUP_GAP_SECS: f64 = 1.0;

/// Parameters for one silence survey.
#[derive(Debug, Clone)]
pub struct SilenceOptions {
    pub mode: ScanMode,
    pub threshold_db: f64,
    pub min_silence_secs: f64,
    /// Evenly spaced windows in sampled mode.
    pub sample_count: usize,
    /// Add a window ahead of every chapter start.
    pub chapter_windows: bool,
}

impl Default for SilenceOptions {
    fn default() -> Self {
        Self {
            mode: ScanMode::Sampled,
            threshold_db: -50.0,
            min_silence_secs: 3.0,
            sample_count: 10,
            chapter_windows: true,
        }
    }
}

fn start_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"silence_start:\s*([-+]?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)").expect("Invalid regex")
    })
}

fn end_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"silence_end:\s*([-+]?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)\s*\|\s*silence_duration:\s*([-+]?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)",
        )
        .expect("Invalid regex")
    })
}

enum ParseState {
    Idle,
    AwaitingEnd { start: f64 },
}

/// Extract paired silence markers from detector diagnostics.
///
/// A start is held until the next end marker; a trailing start with no end
/// is dropped. End markers without a pending start are ignored.
pub fn parse_silence_output(diagnostics: &str) -> Vec<SilenceInterval> {
    let mut intervals = Vec::new();
    let mut state = ParseState::Idle;

    for line in diagnostics.lines() {
        if let Some(caps) = start_marker().captures(line) {
            if let Ok(start) = caps[1].parse::<f64>() {
                state = ParseState::AwaitingEnd { start };
            }
            continue;
        }

        if let Some(caps) = end_marker().captures(line) {
            if let ParseState::AwaitingEnd { start } = state {
                if let (Ok(end), Ok(duration)) = (caps[1].parse::<f64>(), caps[2].parse::<f64>()) {
                    intervals.push(SilenceInterval {
                        start_seconds: start,
                        end_seconds: end,
                        duration_seconds: duration,
                    });
                }
                state = ParseState::Idle;
            }
        }
    }

    intervals
}

/// Sort by start and drop intervals that begin within [`DEDUP_GAP_SECS`]
/// of the previously kept interval's end.
pub fn dedupe_intervals(mut intervals: Vec<SilenceInterval>) -> Vec<SilenceInterval> {
    intervals.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));

    let mut kept: Vec<SilenceInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match kept.last() {
            Some(last) if interval.start_seconds <= last.end_seconds + DEDUP_GAP_SECS => {}
            _ => kept.push(interval),
        }
    }
    kept
}

/// Choose the silence windows for a file.
///
/// Sampled mode on files of at least [`SILENCE_FULL_SWEEP_MAX_SECS`] gets the
/// start window, `sample_count` evenly spaced windows, the final window and
/// optionally one window leading into each chapter, deduplicated and sorted.
pub fn plan_silence_sweep(
    duration_secs: Option<f64>,
    chapters: &[Chapter],
    options: &SilenceOptions,
) -> SweepPlan {
    let duration = match duration_secs {
        Some(d) if options.mode == ScanMode::Sampled && d >= SILENCE_FULL_SWEEP_MAX_SECS => d,
        _ => return SweepPlan::WholeFile,
    };

    let max_start = (duration - SILENCE_WINDOW_SECS).max(0.0);
    let clamp = |s: f64| s.clamp(0.0, max_start);
    // Millisecond keys so nearly equal offsets collapse.
    let key = |s: f64| (clamp(s) * 1000.0).round() as u64;

    let mut offsets = BTreeSet::new();
    offsets.insert(0);

    let count = options.sample_count.max(1);
    let step = duration / count as f64;
    for i in 0..count {
        offsets.insert(key(step * i as f64));
    }

    offsets.insert(key(max_start));

    if options.chapter_windows {
        for chapter in chapters {
            offsets.insert(key(chapter.start_seconds - CHAPTER_LEAD_IN_SECS));
        }
    }

    SweepPlan::Windows(
        offsets
            .into_iter()
            .map(|ms| SampleWindow::new(ms as f64 / 1000.0, SILENCE_WINDOW_SECS))
            .collect(),
    )
}

/// Run silence detection over the planned windows.
///
/// Window-local timestamps are re-based to file time, intervals shorter than
/// `min_silence_secs` are discarded, and overlaps from neighbouring windows are
/// merged. A failed window contributes nothing.
pub async fn survey<F, Fut>(
    tool: &dyn MediaTool,
    path: &Path,
    duration_secs: Option<f64>,
    chapters: &[Chapter],
    options: &SilenceOptions,
    cancel: &CancellationToken,
    mut on_segment: F,
) -> Result<Vec<SilenceInterval>>
where
    F: FnMut(SegmentCounter) -> Fut,
    Fut: Future<Output = ()>,
{
    let plan = plan_silence_sweep(duration_secs, chapters, options);
    let total = plan.len();
    let mut found = Vec::new();

    for (i, window) in plan.passes().into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        on_segment(SegmentCounter {
            current: i + 1,
            total,
        })
        .await;

        let output = match tool
            .detect_silence(
                path,
                window,
                options.threshold_db,
                options.min_silence_secs,
                cancel,
            )
            .await
        {
            Ok(output) => output,
            Err(ScanError::Cancelled) => return Err(ScanError::Cancelled),
            Err(e) => {
                warn!("Silence detection skipped for {} ({:?}): {}", path.display(), window, e);
                continue;
            }
        };

        let offset = window.map(|w| w.start_seconds).unwrap_or(0.0);
        let intervals = parse_silence_output(&output.stderr);
        debug!(
            "{} silences in {} window at {:.1}s",
            intervals.len(),
            path.display(),
            offset
        );
        found.extend(intervals.into_iter().map(|s| s.offset_by(offset)));
    }

    found.retain(|s| s.duration_seconds >= options.min_silence_secs);

    Ok(dedupe_intervals(found))
}

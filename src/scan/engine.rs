//! Scan orchestrator.
//!
//! Runs the per-file phases in a fixed order and drives batches of files,
//! either one at a time or in bounded concurrent batches.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::{
    check_corruption, locate, probe, survey, FfmpegTool, MediaProbe, MediaTool, SilenceOptions,
};
use crate::config::{Config, ScanMode};
use crate::error::{Result, ScanError};

use super::chapters::correlate;
use super::progress::{PhaseReporter, ScanPhase, ScanProgressEvent, ScanTotals};
use super::verdict::ScanVerdict;

/// Capacity of the channel returned by [`ScanEngine::scan_many`].
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Per-call scan parameters.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub mode: ScanMode,
    pub silence_threshold_db: f64,
    pub min_silence_secs: f64,
    pub detect_chapter_silence: bool,
    pub sample_count: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ScanOptions {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.mode,
            silence_threshold_db: config.silence_threshold_db,
            min_silence_secs: config.min_silence_secs,
            detect_chapter_silence: config.detect_chapter_silence,
            sample_count: config.sample_count,
        }
    }
}

impl ScanOptions {
    fn silence(&self) -> SilenceOptions {
        SilenceOptions {
            mode: self.mode,
            threshold_db: self.silence_threshold_db,
            min_silence_secs: self.min_silence_secs,
            sample_count: self.sample_count,
            chapter_windows: self.detect_chapter_silence,
        }
    }
}

/// Scans audiobook files through a [`MediaTool`].
///
/// The engine owns its tool configuration; engines with different tool paths
/// can run side by side. Replacing the tool binaries on disk while a scan is
/// running is undefined behaviour.
#[derive(Clone)]
pub struct ScanEngine {
    tool: Arc<dyn MediaTool>,
    options: ScanOptions,
}

impl ScanEngine {
    pub fn new(tool: Arc<dyn MediaTool>, options: ScanOptions) -> Self {
        Self { tool, options }
    }

    /// Engine backed by the FFmpeg binaries named in `config`.
    pub fn from_config(config: &Config) -> Self {
        let tool = FfmpegTool::new(config.tool_paths()).with_timeout(config.tool_timeout());
        Self::new(Arc::new(tool), ScanOptions::from(config))
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Whether the external tool can be launched.
    pub async fn probe_availability(&self) -> bool {
        self.tool.check_available().await
    }

    /// Scan one file.
    ///
    /// Every failure is reported inside the verdict. The only error is
    /// [`ScanError::Cancelled`], in which case the file's partial results
    /// are discarded.
    ///
    /// Progress events are sent with backpressure, so a caller passing a
    /// sender must keep draining its receiver.
    pub async fn scan_one(
        &self,
        path: &Path,
        cancel: &CancellationToken,
        progress: Option<&mpsc::Sender<ScanProgressEvent>>,
    ) -> Result<ScanVerdict> {
        let started = Instant::now();
        let mut reporter = PhaseReporter::new(path, progress);
        reporter.phase(ScanPhase::Probing, 0.0).await;

        if !path.is_file() {
            warn!("File not found: {}", path.display());
            reporter.phase(ScanPhase::Complete, 1.0).await;
            return Ok(ScanVerdict::failed(
                path,
                ScanError::FileNotFound(path.display().to_string()).to_string(),
            ));
        }

        let media = match probe(self.tool.as_ref(), path, cancel).await {
            Ok(media) => media,
            Err(ScanError::Cancelled) => return Err(ScanError::Cancelled),
            Err(e) => {
                warn!("{}: {}", path.display(), e);
                reporter.phase(ScanPhase::Complete, 1.0).await;
                return Ok(ScanVerdict::failed(path, e.to_string()));
            }
        };

        reporter.set_duration(media.duration);
        let mut verdict = ScanVerdict::from_probe(path, &media);

        if !media.has_audio_stream {
            info!("{}: no audio stream", path.display());
            reporter.phase(ScanPhase::Complete, 1.0).await;
            return Ok(verdict);
        }

        if let Err(e) = self.run_phases(path, &media, &mut verdict, &reporter, cancel).await {
            debug!("Scan of {} stopped: {}", path.display(), e);
            return Err(e);
        }

        reporter.phase(ScanPhase::Complete, 1.0).await;
        info!(
            "{}: {} in {:.1}s",
            verdict.file_name,
            verdict.status(),
            started.elapsed().as_secs_f64()
        );
        Ok(verdict)
    }

    /// Corruption, truncation, silence and chapter phases, in order.
    ///
    /// Tool failures inside a phase degrade to "no finding" in that phase, so
    /// the only error that reaches the caller is [`ScanError::Cancelled`].
    async fn run_phases(
        &self,
        path: &Path,
        media: &MediaProbe,
        verdict: &mut ScanVerdict,
        reporter: &PhaseReporter<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let tool = self.tool.as_ref();
        let duration_secs = media.duration_secs();

        ensure_active(cancel)?;
        reporter.phase(ScanPhase::CheckingCorruption, 0.1).await;
        verdict.is_corrupt = check_corruption(
            tool,
            path,
            duration_secs,
            self.options.mode,
            cancel,
            move |segment| reporter.segment(ScanPhase::CheckingCorruption, 0.1, 0.3, segment),
        )
        .await?;

        ensure_active(cancel)?;
        reporter.phase(ScanPhase::CheckingTruncation, 0.3).await;
        let truncation = locate(tool, path, media.duration, cancel).await?;
        verdict.is_truncated = truncation.is_truncated;
        verdict.actual_duration = truncation.actual_duration;

        ensure_active(cancel)?;
        reporter.phase(ScanPhase::DetectingSilence, 0.5).await;
        verdict.silence_intervals = survey(
            tool,
            path,
            duration_secs,
            &media.chapters,
            &self.options.silence(),
            cancel,
            move |segment| reporter.segment(ScanPhase::DetectingSilence, 0.5, 0.9, segment),
        )
        .await?;

        ensure_active(cancel)?;
        reporter.phase(ScanPhase::AnalyzingChapters, 0.9).await;
        if self.options.detect_chapter_silence {
            verdict.chapter_silence_findings = correlate(&media.chapters, &verdict.silence_intervals);
        }

        Ok(())
    }

    /// Scan many files and stream progress.
    ///
    /// With `concurrency <= 1` files run one after another. Otherwise files
    /// run in batches of `concurrency`: completions within a batch arrive in
    /// finishing order, and batches run in submission order. The channel
    /// closes once, after the last event. After cancellation no further
    /// files start and the interrupted files produce no completion event.
    pub fn scan_many(
        &self,
        paths: Vec<PathBuf>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ScanProgressEvent> {
        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let engine = self.clone();
        tokio::spawn(async move {
            engine.drive(paths, concurrency, cancel, tx).await;
        });
        rx
    }

    async fn drive(
        &self,
        paths: Vec<PathBuf>,
        concurrency: usize,
        cancel: CancellationToken,
        tx: mpsc::Sender<ScanProgressEvent>,
    ) {
        let started = Instant::now();
        let mut totals = ScanTotals {
            total: paths.len(),
            ..ScanTotals::default()
        };

        info!(
            "Scanning {} files ({} mode, concurrency {})",
            paths.len(),
            self.options.mode,
            concurrency.max(1)
        );

        'batches: for batch in paths.chunks(concurrency.max(1)) {
            if cancel.is_cancelled() {
                break;
            }

            let mut running = FuturesUnordered::new();
            for path in batch {
                running.push(self.scan_one(path, &cancel, Some(&tx)));
            }

            while let Some(result) = running.next().await {
                let verdict = match result {
                    Ok(verdict) => verdict,
                    Err(_) => continue,
                };

                totals.completed += 1;
                if verdict.status().is_issue() {
                    totals.with_issues += 1;
                }

                if tx
                    .send(ScanProgressEvent::FileCompleted { verdict, totals })
                    .await
                    .is_err()
                {
                    debug!("Progress receiver dropped, stopping scan");
                    break 'batches;
                }
            }
        }

        if cancel.is_cancelled() {
            warn!(
                "Scan cancelled after {}/{} files",
                totals.completed, totals.total
            );
        } else {
            info!(
                "Scanned {} files in {:.1}s, {} with issues",
                totals.completed,
                started.elapsed().as_secs_f64(),
                totals.with_issues
            );
        }
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ScanError::Cancelled)
    } else {
        Ok(())
    }
}

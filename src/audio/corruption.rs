//! Segment prober: decode-only passes classified for corruption markers.

use std::future::Future;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ScanMode;
use crate::error::{Result, ScanError};

use super::backend::MediaTool;
use super::{SampleWindow, SegmentCounter, SweepPlan};

/// Files at or under this length are always decoded end to end.
pub const FULL_SWEEP_MAX_SECS: f64 = 600.0;

/// Length of each sampled corruption window.
pub const CORRUPTION_WINDOW_SECS: f64 = 120.0;

/// Lowercased substrings of decoder diagnostics that indicate damaged data.
pub const CORRUPTION_MARKERS: &[&str] = &[
    "invalid data found",
    "error while decoding",
    "decoding error",
    "corrupt",
    "discard",
];

/// Classify one decode pass.
///
/// Corrupt if any marker appears in `diagnostics`, or if the tool exited
/// unsuccessfully and printed anything at all. `exit_code` is `None` when the
/// process died to a signal.
pub fn classify_diagnostics(diagnostics: &str, exit_code: Option<i32>) -> bool {
    let lower = diagnostics.to_lowercase();
    if CORRUPTION_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }
    exit_code != Some(0) && !diagnostics.trim().is_empty()
}

/// Choose the corruption windows for a file.
///
/// Short files, files of unknown length, and full mode get one whole-file
/// pass. Otherwise three windows: start, middle and end.
pub fn plan_corruption_sweep(duration_secs: Option<f64>, mode: ScanMode) -> SweepPlan {
    let duration = match duration_secs {
        Some(d) if mode == ScanMode::Sampled && d > FULL_SWEEP_MAX_SECS => d,
        _ => return SweepPlan::WholeFile,
    };

    let half = CORRUPTION_WINDOW_SECS / 2.0;
    SweepPlan::Windows(vec![
        SampleWindow::new(0.0, CORRUPTION_WINDOW_SECS),
        SampleWindow::new(duration / 2.0 - half, CORRUPTION_WINDOW_SECS),
        SampleWindow::new(duration - CORRUPTION_WINDOW_SECS, CORRUPTION_WINDOW_SECS),
    ])
}

/// Decode one window (or the whole file) and classify the diagnostics.
///
/// Launch failures cannot prove corruption: they are logged and reported as
/// `false`. Only cancellation is returned as an error.
pub async fn probe_segment(
    tool: &dyn MediaTool,
    path: &Path,
    window: Option<SampleWindow>,
    cancel: &CancellationToken,
) -> Result<bool> {
    match tool.decode(path, window, cancel).await {
        Ok(output) => {
            let corrupt = classify_diagnostics(&output.stderr, output.exit_code);
            if corrupt {
                debug!(
                    "Corruption markers in {} ({:?}): {}",
                    path.display(),
                    window,
                    output.stderr.lines().next().unwrap_or_default()
                );
            }
            Ok(corrupt)
        }
        Err(ScanError::Cancelled) => Err(ScanError::Cancelled),
        Err(e) => {
            warn!("Corruption check skipped for {}: {}", path.display(), e);
            Ok(false)
        }
    }
}

/// Run the corruption sweep, stopping at the first corrupt window.
///
/// `on_segment` is awaited before each pass.
pub async fn check_corruption<F, Fut>(
    tool: &dyn MediaTool,
    path: &Path,
    duration_secs: Option<f64>,
    mode: ScanMode,
    cancel: &CancellationToken,
    mut on_segment: F,
) -> Result<bool>
where
    F: FnMut(SegmentCounter) -> Fut,
    Fut: Future<Output = ()>,
{
    let plan = plan_corruption_sweep(duration_secs, mode);
    let total = plan.len();

    for (i, window) in plan.passes().into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        on_segment(SegmentCounter {
            current: i + 1,
            total,
        })
        .await;
        if probe_segment(tool, path, window, cancel).await? {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ToolOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mock tool whose decode pass reports the given stderr for windows
    /// starting at or after `bad_from`.
    struct MockDecoder {
        bad_from: Option<f64>,
        launch_fails: bool,
        calls: Mutex<Vec<Option<SampleWindow>>>,
    }

    impl MockDecoder {
        fn clean() -> Self {
            Self {
                bad_from: None,
                launch_fails: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn corrupt_from(secs: f64) -> Self {
            Self {
                bad_from: Some(secs),
                ..Self::clean()
            }
        }

        fn calls(&self) -> Vec<Option<SampleWindow>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaTool for MockDecoder {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn check_available(&self) -> bool {
            true
        }

        async fn inspect(&self, _: &Path, _: &CancellationToken) -> Result<ToolOutput> {
            unreachable!()
        }

        async fn decode(
            &self,
            _path: &Path,
            window: Option<SampleWindow>,
            _cancel: &CancellationToken,
        ) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(window);
            if self.launch_fails {
                return Err(ScanError::ToolLaunch {
                    tool: "mock".to_string(),
                    message: "no such file".to_string(),
                });
            }
            let start = window.map(|w| w.start_seconds).unwrap_or(0.0);
            let stderr = match self.bad_from {
                Some(bad) if start >= bad || window.is_none() => {
                    "[aac @ 0x55d] Invalid data found when processing input\n".to_string()
                }
                _ => String::new(),
            };
            Ok(ToolOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr,
            })
        }

        async fn detect_silence(
            &self,
            _: &Path,
            _: Option<SampleWindow>,
            _: f64,
            _: f64,
            _: &CancellationToken,
        ) -> Result<ToolOutput> {
            unreachable!()
        }

        async fn extract_sample(
            &self,
            _: &Path,
            _: f64,
            _: f64,
            _: &Path,
            _: &CancellationToken,
        ) -> Result<ToolOutput> {
            unreachable!()
        }
    }

    #[test]
    fn test_classify_markers() {
        assert!(classify_diagnostics(
            "[mp3float @ 0x1] Error while decoding stream #0:0: Invalid data found",
            Some(0)
        ));
        assert!(classify_diagnostics("[aac @ 0x2] channel element 1.0 is not allocated\nCORRUPT packet", Some(0)));
        assert!(classify_diagnostics("Discarding frame with invalid size", Some(0)));
    }

    #[test]
    fn test_classify_exit_code() {
        assert!(!classify_diagnostics("", Some(0)));
        assert!(!classify_diagnostics("", Some(1)));
        assert!(classify_diagnostics("moov atom not found", Some(1)));
        assert!(classify_diagnostics("killed", None));
        assert!(!classify_diagnostics("  \n", None));
    }

    #[test]
    fn test_plan_short_file_is_whole() {
        assert_eq!(plan_corruption_sweep(Some(600.0), ScanMode::Sampled), SweepPlan::WholeFile);
        assert_eq!(plan_corruption_sweep(None, ScanMode::Sampled), SweepPlan::WholeFile);
        assert_eq!(plan_corruption_sweep(Some(36_000.0), ScanMode::Full), SweepPlan::WholeFile);
    }

    #[test]
    fn test_plan_long_file_windows() {
        let plan = plan_corruption_sweep(Some(3600.0), ScanMode::Sampled);
        assert_eq!(
            plan,
            SweepPlan::Windows(vec![
                SampleWindow::new(0.0, 120.0),
                SampleWindow::new(1740.0, 120.0),
                SampleWindow::new(3480.0, 120.0),
            ])
        );
        assert_eq!(plan.len(), 3);
    }

    #[tokio::test]
    async fn test_sweep_short_circuits_on_first_corrupt_window() {
        let tool = MockDecoder::corrupt_from(0.0);
        let mut counters = Vec::new();
        let corrupt = check_corruption(
            &tool,
            Path::new("/books/a.m4b"),
            Some(3600.0),
            ScanMode::Sampled,
            &CancellationToken::new(),
            |c| {
                counters.push(c);
                async {}
            },
        )
        .await
        .unwrap();

        assert!(corrupt);
        assert_eq!(tool.calls().len(), 1);
        assert_eq!(counters, vec![SegmentCounter { current: 1, total: 3 }]);
    }

    #[tokio::test]
    async fn test_sweep_finds_corrupt_tail() {
        let tool = MockDecoder::corrupt_from(3000.0);
        let corrupt = check_corruption(
            &tool,
            Path::new("/books/a.m4b"),
            Some(3600.0),
            ScanMode::Sampled,
            &CancellationToken::new(),
            |_| async {},
        )
        .await
        .unwrap();

        assert!(corrupt);
        assert_eq!(tool.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_clean_file_checks_every_window() {
        let tool = MockDecoder::clean();
        let corrupt = check_corruption(
            &tool,
            Path::new("/books/a.m4b"),
            Some(3600.0),
            ScanMode::Sampled,
            &CancellationToken::new(),
            |_| async {},
        )
        .await
        .unwrap();

        assert!(!corrupt);
        assert_eq!(tool.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_launch_failure_is_not_corruption() {
        let tool = MockDecoder {
            launch_fails: true,
            ..MockDecoder::clean()
        };
        let corrupt = probe_segment(&tool, Path::new("/books/a.mp3"), None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!corrupt);
    }

    #[tokio::test]
    async fn test_cancelled_sweep_stops_before_probing() {
        let tool = MockDecoder::clean();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = check_corruption(
            &tool,
            Path::new("/books/a.m4b"),
            Some(3600.0),
            ScanMode::Sampled,
            &cancel,
            |_| async {},
        )
        .await;

        assert!(matches!(result, Err(ScanError::Cancelled)));
        assert!(tool.calls().is_empty());
    }
}

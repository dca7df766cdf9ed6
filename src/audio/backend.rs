use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ToolPaths;
use crate::error::Result;

use super::tool::{ToolCommand, ToolOutput, DEFAULT_TIMEOUT};
use super::SampleWindow;

/// Timeout for `-version` availability checks.
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// The external media tool, reduced to the invocations the scanner needs.
///
/// Implementations only run the tool and hand back what it printed; all
/// interpretation of that output lives in the component modules.
#[async_trait]
pub trait MediaTool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the tool binaries can be launched at all.
    async fn check_available(&self) -> bool;

    /// Format, stream and chapter metadata as JSON on stdout.
    async fn inspect(&self, path: &Path, cancel: &CancellationToken) -> Result<ToolOutput>;

    /// Decode-only pass with error-level diagnostics on stderr.
    async fn decode(
        &self,
        path: &Path,
        window: Option<SampleWindow>,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput>;

    /// Decode-only pass through a silence detector; markers on stderr.
    async fn detect_silence(
        &self,
        path: &Path,
        window: Option<SampleWindow>,
        threshold_db: f64,
        min_silence_secs: f64,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput>;

    /// Stream-copy `length_seconds` of audio starting at `seek_seconds` into `dest`.
    async fn extract_sample(
        &self,
        path: &Path,
        seek_seconds: f64,
        length_seconds: f64,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput>;
}

/// [`MediaTool`] backed by the `ffmpeg` and `ffprobe` CLIs.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    paths: ToolPaths,
    timeout: Duration,
}

impl FfmpegTool {
    pub fn new(paths: ToolPaths) -> Self {
        Self {
            paths,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }

    fn ffmpeg(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.paths.ffmpeg.clone());
        cmd.timeout(self.timeout)
            .args(["-hide_banner", "-nostdin", "-nostats"]);
        cmd
    }

    async fn version_ok(&self, program: &Path) -> bool {
        let result = ToolCommand::new(program.to_path_buf())
            .arg("-version")
            .timeout(VERSION_CHECK_TIMEOUT)
            .execute(&CancellationToken::new())
            .await;

        match result {
            Ok(output) if output.success() => true,
            Ok(output) => {
                debug!(
                    "{} -version exited with {:?}",
                    program.display(),
                    output.exit_code
                );
                false
            }
            Err(e) => {
                debug!("{} unavailable: {}", program.display(), e);
                false
            }
        }
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new(ToolPaths::default())
    }
}

fn window_args(cmd: &mut ToolCommand, window: Option<SampleWindow>) {
    if let Some(window) = window {
        cmd.arg("-ss")
            .arg(format!("{:.3}", window.start_seconds.max(0.0)))
            .arg("-t")
            .arg(format!("{:.3}", window.length_seconds));
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn check_available(&self) -> bool {
        self.version_ok(&self.paths.ffmpeg).await && self.version_ok(&self.paths.ffprobe).await
    }

    async fn inspect(&self, path: &Path, cancel: &CancellationToken) -> Result<ToolOutput> {
        let mut cmd = ToolCommand::new(self.paths.ffprobe.clone());
        cmd.timeout(self.timeout).args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-show_chapters",
        ]);
        cmd.path_arg(path);
        cmd.execute(cancel).await
    }

    async fn decode(
        &self,
        path: &Path,
        window: Option<SampleWindow>,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput> {
        let mut cmd = self.ffmpeg();
        cmd.args(["-v", "error"]);
        window_args(&mut cmd, window);
        cmd.arg("-i").path_arg(path);
        cmd.args(["-vn", "-f", "null", "-"]);
        cmd.execute(cancel).await
    }

    async fn detect_silence(
        &self,
        path: &Path,
        window: Option<SampleWindow>,
        threshold_db: f64,
        min_silence_secs: f64,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput> {
        let mut cmd = self.ffmpeg();
        // silencedetect reports at info level
        cmd.args(["-v", "info"]);
        window_args(&mut cmd, window);
        cmd.arg("-i").path_arg(path);
        cmd.arg("-vn")
            .arg("-af")
            .arg(format!(
                "silencedetect=noise={}dB:d={}",
                threshold_db, min_silence_secs
            ))
            .args(["-f", "null", "-"]);
        cmd.execute(cancel).await
    }

    async fn extract_sample(
        &self,
        path: &Path,
        seek_seconds: f64,
        length_seconds: f64,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput> {
        let mut cmd = self.ffmpeg();
        cmd.args(["-v", "error", "-y", "-ss"])
            .arg(format!("{:.3}", seek_seconds.max(0.0)))
            .arg("-i")
            .path_arg(path)
            .arg("-t")
            .arg(format!("{:.3}", length_seconds))
            .args(["-vn", "-c:a", "copy", "-f", "matroska"])
            .path_arg(dest);
        cmd.execute(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_binaries_are_unavailable() {
        let tool = FfmpegTool::new(ToolPaths {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg_xyz"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe_xyz"),
        });
        assert!(!tool.check_available().await);
    }

    #[tokio::test]
    async fn test_instances_keep_their_own_paths() {
        let a = FfmpegTool::new(ToolPaths {
            ffmpeg: PathBuf::from("/opt/a/ffmpeg"),
            ffprobe: PathBuf::from("/opt/a/ffprobe"),
        });
        let b = FfmpegTool::default();

        assert_eq!(a.paths().ffmpeg, PathBuf::from("/opt/a/ffmpeg"));
        assert_eq!(b.paths().ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[tokio::test]
    async fn test_inspect_with_missing_ffprobe_is_launch_error() {
        let tool = FfmpegTool::new(ToolPaths {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe_xyz"),
        });
        let result = tool
            .inspect(Path::new("/tmp/book.m4b"), &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(crate::error::ScanError::ToolLaunch { .. })
        ));
    }
}

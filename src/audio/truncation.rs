//! Truncation locator.
//!
//! Finds where decodable audio really ends by extracting short stream-copied
//! samples at chosen offsets and judging presence by output size.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, ScanError};

use super::backend::MediaTool;

/// Files shorter than this are never checked for truncation.
pub const MIN_TRUNCATION_CHECK_SECS: f64 = 60.0;

/// Fraction of the claimed duration probed first.
pub const FAST_PATH_FRACTION: f64 = 0.9;

/// Ascending checkpoints used to bracket the end of data.
pub const CHECKPOINTS_SECS: &[f64] = &[60.0, 300.0, 600.0, 1200.0];

/// Binary search stops once the bracket is this narrow.
pub const SEARCH_RESOLUTION_SECS: f64 = 30.0;

/// Missing fraction above which a file counts as truncated.
pub const TRUNCATION_THRESHOLD: f64 = 0.05;

/// Length of each presence sample.
pub const PRESENCE_SAMPLE_SECS: f64 = 3.0;

/// Samples larger than this contain real audio; headers and cover art alone
/// stay well below it.
pub const PRESENCE_MIN_BYTES: u64 = 15 * 1024;

/// Outcome of truncation checking for one file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruncationReport {
    pub is_truncated: bool,
    /// End of decodable audio; equals the claimed duration when not truncated.
    pub actual_duration: Option<Duration>,
}

impl TruncationReport {
    fn intact(claimed: Option<Duration>) -> Self {
        Self {
            is_truncated: false,
            actual_duration: claimed,
        }
    }
}

/// Whether decodable audio exists at `seek_seconds`.
///
/// Any tool or filesystem failure counts as "no audio". The scratch file is
/// removed on every path.
pub async fn has_audio_at(
    tool: &dyn MediaTool,
    path: &Path,
    seek_seconds: f64,
    cancel: &CancellationToken,
) -> Result<bool> {
    let scratch = match tempfile::Builder::new()
        .prefix("audiobook-scan-")
        .suffix(".mka")
        .tempfile()
    {
        Ok(file) => file,
        Err(e) => {
            warn!("Failed to create scratch file for truncation probe: {}", e);
            return Ok(false);
        }
    };

    match tool
        .extract_sample(path, seek_seconds, PRESENCE_SAMPLE_SECS, scratch.path(), cancel)
        .await
    {
        Ok(_) => {}
        Err(ScanError::Cancelled) => return Err(ScanError::Cancelled),
        Err(e) => {
            warn!(
                "Sample extraction at {:.1}s failed for {}: {}",
                seek_seconds,
                path.display(),
                e
            );
            return Ok(false);
        }
    }

    let size = match tokio::fs::metadata(scratch.path()).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!("Failed to stat truncation sample: {}", e);
            return Ok(false);
        }
    };

    debug!("Sample at {:.1}s: {} bytes", seek_seconds, size);
    Ok(size > PRESENCE_MIN_BYTES)
}

/// Determine whether `path` ends before its claimed duration.
///
/// No-op for unknown durations and files under a minute.
pub async fn locate(
    tool: &dyn MediaTool,
    path: &Path,
    claimed: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<TruncationReport> {
    let claimed_secs = match claimed.map(|d| d.as_secs_f64()) {
        Some(secs) if secs >= MIN_TRUNCATION_CHECK_SECS => secs,
        _ => return Ok(TruncationReport::intact(claimed)),
    };

    let fast_path = claimed_secs * FAST_PATH_FRACTION;
    if has_audio_at(tool, path, fast_path, cancel).await? {
        return Ok(TruncationReport::intact(claimed));
    }

    // No audio at the fast-path offset, so that is the first known gap.
    let mut low = 0.0;
    let mut high = fast_path;

    for &checkpoint in CHECKPOINTS_SECS {
        if checkpoint >= high {
            break;
        }
        if has_audio_at(tool, path, checkpoint, cancel).await? {
            low = checkpoint;
        } else {
            high = checkpoint;
            break;
        }
    }

    while high - low > SEARCH_RESOLUTION_SECS {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let mid = (low + high) / 2.0;
        if has_audio_at(tool, path, mid, cancel).await? {
            low = mid;
        } else {
            high = mid;
        }
    }

    let missing = (claimed_secs - low) / claimed_secs;
    let is_truncated = missing > TRUNCATION_THRESHOLD;

    if is_truncated {
        info!(
            "{} appears truncated: audio ends near {:.0}s of {:.0}s ({:.1}% missing)",
            path.display(),
            low,
            claimed_secs,
            missing * 100.0
        );
        Ok(TruncationReport {
            is_truncated,
            actual_duration: Some(Duration::from_secs_f64(low)),
        })
    } else {
        Ok(TruncationReport::intact(claimed))
    }
}

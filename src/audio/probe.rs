//! Probe adapter: one `ffprobe` JSON inspection per file, mapped into [`MediaProbe`].

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, ScanError};

use super::backend::MediaTool;
use super::{Chapter, MediaProbe};

/// Inspect `path` and return its metadata.
///
/// Fails with [`ScanError::Probe`] when the tool cannot be started, exits
/// non-zero, or prints something that is not valid JSON. A file without an
/// audio stream is not an error.
pub async fn probe(
    tool: &dyn MediaTool,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<MediaProbe> {
    let output = match tool.inspect(path, cancel).await {
        Ok(output) => output,
        Err(ScanError::Cancelled) => return Err(ScanError::Cancelled),
        Err(e) => return Err(ScanError::Probe(e.to_string())),
    };

    if !output.success() {
        let stderr = output.stderr.trim();
        return Err(ScanError::Probe(if stderr.is_empty() {
            format!("{} exited with status {:?}", tool.name(), output.exit_code)
        } else {
            format!("{} failed: {}", tool.name(), stderr)
        }));
    }

    let probe = parse_probe_output(&output.stdout)?;
    debug!(
        "Probed {}: audio={}, codec={:?}, duration={:?}, {} chapters",
        path.display(),
        probe.has_audio_stream,
        probe.codec,
        probe.duration,
        probe.chapters.len()
    );
    Ok(probe)
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    chapters: Vec<FfprobeChapter>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeChapter {
    start_time: Option<String>,
    end_time: Option<String>,
    #[serde(default)]
    tags: FfprobeTags,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    title: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse `ffprobe -print_format json` output.
///
/// Unparseable numeric fields become `None`; only malformed JSON is an error.
pub fn parse_probe_output(json: &str) -> Result<MediaProbe> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| ScanError::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let audio = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let format_bitrate = ff
        .format
        .as_ref()
        .and_then(|f| parse_number::<u64>(f.bit_rate.as_deref()));

    let duration = ff
        .format
        .as_ref()
        .and_then(|f| parse_number::<f64>(f.duration.as_deref()))
        .and_then(|d| Duration::try_from_secs_f64(d).ok());

    let chapters = ff
        .chapters
        .iter()
        .enumerate()
        .map(|(index, c)| {
            let start = parse_number::<f64>(c.start_time.as_deref()).unwrap_or(0.0);
            let end = parse_number::<f64>(c.end_time.as_deref()).unwrap_or(start);
            Chapter {
                index,
                title: c
                    .tags
                    .title
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| format!("Chapter {}", index + 1)),
                start_seconds: start,
                end_seconds: end.max(start),
            }
        })
        .collect();

    Ok(MediaProbe {
        has_audio_stream: audio.is_some(),
        codec: audio.and_then(|a| a.codec_name.clone()),
        bitrate_bps: audio
            .and_then(|a| parse_number::<u64>(a.bit_rate.as_deref()))
            .or(format_bitrate),
        sample_rate_hz: audio.and_then(|a| parse_number::<u32>(a.sample_rate.as_deref())),
        duration,
        chapters,
    })
}

fn parse_number<T: std::str::FromStr>(s: Option<&str>) -> Option<T> {
    s.and_then(|v| v.trim().parse().ok())
}

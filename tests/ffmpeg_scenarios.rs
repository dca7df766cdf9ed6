//! End-to-end scans against the real FFmpeg tools.
//!
//! Skipped when ffmpeg or ffprobe is not installed.

use audiobook_scan::config::{Config, ScanMode};
use audiobook_scan::{ScanEngine, ScanStatus};
use std::f32::consts::PI;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const SAMPLE_RATE: u32 = 16_000;

fn tool_available(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn ffmpeg_available() -> bool {
    tool_available("ffmpeg") && tool_available("ffprobe")
}

/// Mono 16-bit WAV: `tone` seconds of 440 Hz, `gap` seconds of digital
/// silence, then `tone` seconds of 440 Hz again.
fn write_tone_gap_tone(path: &Path, tone: u32, gap: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let tone_samples = tone * SAMPLE_RATE;

    for n in 0..tone_samples {
        let t = n as f32 / SAMPLE_RATE as f32;
        writer
            .write_sample(((2.0 * PI * 440.0 * t).sin() * 16_000.0) as i16)
            .unwrap();
    }
    for _ in 0..gap * SAMPLE_RATE {
        writer.write_sample(0i16).unwrap();
    }
    for n in 0..tone_samples {
        let t = n as f32 / SAMPLE_RATE as f32;
        writer
            .write_sample(((2.0 * PI * 440.0 * t).sin() * 16_000.0) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

fn engine(min_silence_secs: f64) -> ScanEngine {
    let config = Config {
        silence_threshold_db: -50.0,
        min_silence_secs,
        ..Config::default()
    };
    ScanEngine::from_config(&config)
}

#[tokio::test]
async fn test_detects_long_silence_in_short_file() {
    if !ffmpeg_available() {
        eprintln!("Skipping test: FFmpeg not available");
        return;
    }

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gap.wav");
    write_tone_gap_tone(&path, 3, 15);

    let verdict = engine(10.0)
        .scan_one(&path, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert!(verdict.has_audio_stream);
    assert!(!verdict.is_corrupt, "clean WAV flagged corrupt: {verdict:?}");
    assert!(!verdict.is_truncated);
    assert!(verdict.has_long_silence());
    assert_eq!(verdict.silence_intervals.len(), 1, "{:?}", verdict.silence_intervals);

    let gap = &verdict.silence_intervals[0];
    assert!(
        (14.5..=15.5).contains(&gap.duration_seconds),
        "duration = {}",
        gap.duration_seconds
    );
    assert!((gap.start_seconds - 3.0).abs() < 0.5, "start = {}", gap.start_seconds);
    assert_eq!(verdict.status(), ScanStatus::Silence);
}

#[tokio::test]
async fn test_short_pause_is_not_reported() {
    if !ffmpeg_available() {
        eprintln!("Skipping test: FFmpeg not available");
        return;
    }

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pause.wav");
    write_tone_gap_tone(&path, 3, 1);

    let verdict = engine(3.0)
        .with_mode(ScanMode::Full)
        .scan_one(&path, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert!(verdict.silence_intervals.is_empty());
    assert_eq!(verdict.status(), ScanStatus::Ok);
    assert_eq!(verdict.codec.as_deref(), Some("pcm_s16le"));
    assert_eq!(verdict.sample_rate_hz, Some(SAMPLE_RATE));
}

#[tokio::test]
async fn test_file_without_audio_stream() {
    if !ffmpeg_available() {
        eprintln!("Skipping test: FFmpeg not available");
        return;
    }

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("video-only.mkv");
    let generated = Command::new("ffmpeg")
        .args(["-v", "error", "-f", "lavfi", "-i", "color=c=black:s=32x32:d=1"])
        .args(["-an", "-c:v", "mpeg4", "-y"])
        .arg(&path)
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if !generated {
        eprintln!("Skipping test: FFmpeg could not generate a video-only file");
        return;
    }

    let verdict = engine(3.0)
        .scan_one(&path, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert!(!verdict.has_audio_stream);
    assert_eq!(verdict.status(), ScanStatus::MissingAudio);
    assert!(!verdict.is_corrupt);
    assert!(verdict.silence_intervals.is_empty());
    assert!(verdict.chapter_silence_findings.is_empty());
}

#[tokio::test]
async fn test_garbage_file_is_reported_not_raised() {
    if !ffmpeg_available() {
        eprintln!("Skipping test: FFmpeg not available");
        return;
    }

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.m4b");
    std::fs::write(&path, b"this is not an audiobook").unwrap();

    let verdict = engine(3.0)
        .scan_one(&path, &CancellationToken::new(), None)
        .await
        .unwrap();

    assert!(!verdict.is_clean());
    assert!(matches!(
        verdict.status(),
        ScanStatus::Error | ScanStatus::MissingAudio
    ));
}

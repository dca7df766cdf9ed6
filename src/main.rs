use anyhow::{Context, Result};
use audiobook_scan::config::{Config, ScanMode};
use audiobook_scan::discovery::collect_audio_files;
use audiobook_scan::report::print_summary;
use audiobook_scan::{ScanEngine, ScanProgressEvent, ScanVerdict};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "audiobook-scan")]
#[command(version, about = "Find corrupt, truncated and silent audiobook files")]
#[command(long_about = "Scan audiobook files or folders with FFmpeg and report corruption, truncation, long silences and silence at chapter boundaries.")]
struct Cli {
    /// Audio files or directories to scan
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Scan mode: sampled, full
    #[arg(short, long)]
    mode: Option<String>,

    /// Silence threshold in dB (e.g. -50)
    #[arg(long, allow_hyphen_values = true)]
    threshold_db: Option<f64>,

    /// Minimum silence duration in seconds
    #[arg(long)]
    min_silence: Option<f64>,

    /// Do not look for silence at chapter boundaries
    #[arg(long)]
    no_chapter_silence: bool,

    /// Evenly spaced silence windows in sampled mode
    #[arg(long)]
    samples: Option<usize>,

    /// Number of files scanned concurrently
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn apply_cli(cli: &Cli, config: &mut Config) -> Result<()> {
    if let Some(ref mode) = cli.mode {
        config.mode = mode.parse::<ScanMode>().map_err(|e| anyhow::anyhow!(e))?;
    }
    if let Some(db) = cli.threshold_db {
        config.silence_threshold_db = db;
    }
    if let Some(secs) = cli.min_silence {
        config.min_silence_secs = secs;
    }
    if cli.no_chapter_silence {
        config.detect_chapter_silence = false;
    }
    if let Some(samples) = cli.samples {
        config.sample_count = samples;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(ref ffmpeg) = cli.ffmpeg {
        config.ffmpeg_path = ffmpeg.clone();
    }
    if let Some(ref ffprobe) = cli.ffprobe {
        config.ffprobe_path = ffprobe.clone();
    }
    Ok(())
}

fn progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_cli(&cli, &mut config)?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let files = collect_audio_files(&cli.paths).context("Failed to collect input files")?;
    if files.is_empty() {
        anyhow::bail!("No supported audio files found");
    }

    let engine = ScanEngine::from_config(&config);
    if !engine.probe_availability().await {
        anyhow::bail!(
            "FFmpeg not found at '{}' / '{}'. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)",
            config.ffmpeg_path.display(),
            config.ffprobe_path.display()
        );
    }

    info!("Files:       {}", files.len());
    info!("Mode:        {}", config.mode);
    info!("Concurrency: {}", config.concurrency);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    let started = Instant::now();
    let pb = progress_bar(files.len());
    let mut verdicts: Vec<ScanVerdict> = Vec::with_capacity(files.len());
    let mut events = engine.scan_many(files, config.concurrency, cancel.clone());

    while let Some(event) = events.recv().await {
        match event {
            ScanProgressEvent::Phase {
                path,
                phase,
                segment,
                ..
            } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match segment {
                    Some(segment) => pb.set_message(format!("{name}: {phase} {segment}")),
                    None => pb.set_message(format!("{name}: {phase}")),
                }
            }
            ScanProgressEvent::FileCompleted { verdict, totals } => {
                pb.set_position(totals.completed as u64);
                verdicts.push(verdict);
            }
        }
    }

    pb.finish_and_clear();

    if cancel.is_cancelled() {
        warn!("Scan interrupted; showing completed files only");
    }

    print_summary(&verdicts, started.elapsed());

    if verdicts.iter().any(|v| !v.is_clean()) {
        std::process::exit(1);
    }

    Ok(())
}

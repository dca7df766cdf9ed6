use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Probe a bounded set of windows on long files.
    #[default]
    Sampled,
    /// Decode every file end to end.
    Full,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanMode::Sampled => write!(f, "sampled"),
            ScanMode::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sampled" | "quick" => Ok(ScanMode::Sampled),
            "full" => Ok(ScanMode::Full),
            _ => Err(format!("Unknown scan mode: {}. Use 'sampled' or 'full'", s)),
        }
    }
}

/// Locations of the external FFmpeg binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Noise floor for silencedetect, in dB. Must be negative.
    pub silence_threshold_db: f64,
    /// Shortest silence worth reporting, in seconds.
    pub min_silence_secs: f64,
    pub detect_chapter_silence: bool,
    pub mode: ScanMode,
    /// Evenly spaced silence windows in sampled mode.
    pub sample_count: usize,
    pub concurrency: usize,
    /// Upper bound on any single FFmpeg invocation.
    pub tool_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let tools = ToolPaths::default();
        Self {
            ffmpeg_path: tools.ffmpeg,
            ffprobe_path: tools.ffprobe,
            silence_threshold_db: -50.0,
            min_silence_secs: 3.0,
            detect_chapter_silence: true,
            mode: ScanMode::default(),
            sample_count: 10,
            concurrency: 4,
            tool_timeout_secs: 3600,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    ScanError::Config(format!("{}: {e}", config_path.display()))
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("AUDIOBOOK_SCAN_FFMPEG") {
            self.ffmpeg_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("AUDIOBOOK_SCAN_FFPROBE") {
            self.ffprobe_path = PathBuf::from(path);
        }
        if let Ok(mode) = std::env::var("AUDIOBOOK_SCAN_MODE") {
            if let Ok(m) = mode.parse() {
                self.mode = m;
            }
        }
        if let Ok(concurrency) = std::env::var("AUDIOBOOK_SCAN_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }
        if let Ok(threshold) = std::env::var("AUDIOBOOK_SCAN_THRESHOLD_DB") {
            if let Ok(t) = threshold.parse() {
                self.silence_threshold_db = t;
            }
        }
        if let Ok(min_silence) = std::env::var("AUDIOBOOK_SCAN_MIN_SILENCE") {
            if let Ok(s) = min_silence.parse() {
                self.min_silence_secs = s;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ScanError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if self.sample_count == 0 {
            return Err(ScanError::Config(
                "Sample count must be greater than 0".to_string(),
            ));
        }

        if !(self.silence_threshold_db < 0.0) {
            return Err(ScanError::Config(format!(
                "Silence threshold must be negative dB, got {}",
                self.silence_threshold_db
            )));
        }

        if !(self.min_silence_secs > 0.0) {
            return Err(ScanError::Config(format!(
                "Minimum silence duration must be positive, got {}",
                self.min_silence_secs
            )));
        }

        if self.tool_timeout_secs == 0 {
            return Err(ScanError::Config(
                "Tool timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn tool_paths(&self) -> ToolPaths {
        ToolPaths {
            ffmpeg: self.ffmpeg_path.clone(),
            ffprobe: self.ffprobe_path.clone(),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("audiobook-scan").join("config.toml"))
    }
}

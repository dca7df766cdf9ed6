use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Failed to run {tool}: {message}")]
    ToolLaunch { tool: String, message: String },

    #[error("Failed to parse tool output: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

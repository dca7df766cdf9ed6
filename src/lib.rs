pub mod audio;
pub mod config;
pub mod discovery;
pub mod error;
pub mod report;
pub mod scan;

pub use config::{Config, ScanMode};
pub use error::{Result, ScanError};
pub use scan::{
    ScanEngine, ScanOptions, ScanPhase, ScanProgressEvent, ScanStatus, ScanTotals, ScanVerdict,
};

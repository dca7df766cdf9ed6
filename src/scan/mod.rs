pub mod chapters;
pub mod engine;
pub mod progress;
pub mod verdict;

pub use chapters::{correlate, ChapterSilenceFinding};
pub use engine::{ScanEngine, ScanOptions};
pub use progress::{ScanPhase, ScanProgressEvent, ScanTotals};
pub use verdict::{ScanStatus, ScanVerdict};

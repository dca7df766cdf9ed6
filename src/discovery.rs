//! Expand command-line inputs into a sorted list of audio files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, ScanError};

/// Container extensions the scanner accepts, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "m4b", "m4a", "mp3", "aac", "flac", "ogg", "opus", "wav", "wma", "mka",
];

pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Resolve files and directories into audio files.
///
/// Files given explicitly are kept only if their extension is supported;
/// directories are walked recursively. The result is sorted and deduplicated.
pub fn collect_audio_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            if is_supported_audio(input) {
                files.push(input.clone());
            } else {
                warn!("Skipping unsupported file: {}", input.display());
            }
        } else if input.is_dir() {
            for entry in WalkDir::new(input).follow_links(true) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable entry: {}", e);
                        continue;
                    }
                };
                if entry.file_type().is_file() && is_supported_audio(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else {
            return Err(ScanError::FileNotFound(input.display().to_string()));
        }
    }

    files.sort();
    files.dedup();
    debug!("Collected {} audio files", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_audio(Path::new("/a/book.m4b")));
        assert!(is_supported_audio(Path::new("/a/BOOK.MP3")));
        assert!(!is_supported_audio(Path::new("/a/cover.jpg")));
        assert!(!is_supported_audio(Path::new("/a/README")));
    }

    #[test]
    fn test_collect_walks_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("Series").join("Book 2");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("b.mp3"), b"x").unwrap();
        fs::write(nested.join("a.m4b"), b"x").unwrap();
        fs::write(nested.join("cover.jpg"), b"x").unwrap();

        let files = collect_audio_files(&[dir.path().to_path_buf()]).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.windows(2).all(|w| w[0] <= w[1]));
        assert!(files.iter().all(|f| is_supported_audio(f)));
    }

    #[test]
    fn test_collect_dedups_explicit_and_walked() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.flac");
        fs::write(&file, b"x").unwrap();

        let files = collect_audio_files(&[file.clone(), dir.path().to_path_buf()]).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn test_collect_missing_input() {
        let result = collect_audio_files(&[PathBuf::from("/nonexistent/books")]);
        assert!(matches!(result, Err(ScanError::FileNotFound(_))));
    }
}

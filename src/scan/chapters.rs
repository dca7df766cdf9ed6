use serde::{Deserialize, Serialize};

use crate::audio::{Chapter, SilenceInterval};

/// How close a silence must start to a chapter's end to belong to it.
pub const CHAPTER_SILENCE_TOLERANCE_SECS: f64 = 5.0;

/// A silence that begins at the end of a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSilenceFinding {
    pub chapter: Chapter,
    pub silence: SilenceInterval,
}

/// Attribute silences to the chapters they follow.
///
/// Each chapter takes the first interval, in interval order, that starts
/// within [`CHAPTER_SILENCE_TOLERANCE_SECS`] of its end. Chapters are matched
/// independently, so one interval can be reported for two chapters whose
/// ends are close together.
pub fn correlate(chapters: &[Chapter], silences: &[SilenceInterval]) -> Vec<ChapterSilenceFinding> {
    chapters
        .iter()
        .filter_map(|chapter| {
            silences
                .iter()
                .find(|s| {
                    (s.start_seconds - chapter.end_seconds).abs() <= CHAPTER_SILENCE_TOLERANCE_SECS
                })
                .map(|silence| ChapterSilenceFinding {
                    chapter: chapter.clone(),
                    silence: *silence,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(index: usize, start: f64, end: f64) -> Chapter {
        Chapter {
            index,
            title: format!("Chapter {}", index + 1),
            start_seconds: start,
            end_seconds: end,
        }
    }

    fn silence(start: f64, end: f64) -> SilenceInterval {
        SilenceInterval {
            start_seconds: start,
            end_seconds: end,
            duration_seconds: end - start,
        }
    }

    #[test]
    fn test_matches_silence_near_chapter_end() {
        let chapters = vec![chapter(0, 0.0, 600.0), chapter(1, 600.0, 1200.0)];
        let silences = vec![silence(120.0, 135.0), silence(597.0, 612.0)];

        let findings = correlate(&chapters, &silences);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].chapter.index, 0);
        assert_eq!(findings[0].silence, silence(597.0, 612.0));
    }

    #[test]
    fn test_tolerance_is_inclusive_both_sides() {
        let chapters = vec![chapter(0, 0.0, 100.0)];
        assert_eq!(correlate(&chapters, &[silence(95.0, 110.0)]).len(), 1);
        assert_eq!(correlate(&chapters, &[silence(105.0, 120.0)]).len(), 1);
        assert!(correlate(&chapters, &[silence(105.5, 120.0)]).is_empty());
        assert!(correlate(&chapters, &[silence(94.0, 120.0)]).is_empty());
    }

    #[test]
    fn test_first_match_wins_per_chapter() {
        let chapters = vec![chapter(0, 0.0, 100.0)];
        let findings = correlate(&chapters, &[silence(98.0, 110.0), silence(101.0, 120.0)]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].silence.start_seconds, 98.0);
    }

    #[test]
    fn test_one_silence_can_serve_adjacent_chapters() {
        let chapters = vec![chapter(0, 0.0, 100.0), chapter(1, 100.0, 103.0)];
        let findings = correlate(&chapters, &[silence(101.0, 130.0)]);
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_no_chapters_or_silences() {
        assert!(correlate(&[], &[silence(1.0, 20.0)]).is_empty());
        assert!(correlate(&[chapter(0, 0.0, 10.0)], &[]).is_empty());
    }
}

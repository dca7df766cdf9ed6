//! Terminal summary of scan results.

use std::collections::BTreeMap;
use std::time::Duration;

use console::{style, StyledObject};

use crate::scan::{ScanStatus, ScanVerdict};

/// Format seconds as `H:MM:SS`, or `M:SS` under an hour.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

fn format_duration(d: Option<Duration>) -> String {
    d.map(|d| format_timestamp(d.as_secs_f64()))
        .unwrap_or_else(|| "?".to_string())
}

fn styled_status(status: ScanStatus) -> StyledObject<String> {
    let label = status.to_string();
    match status {
        ScanStatus::Ok => style(label).green(),
        ScanStatus::Silence | ScanStatus::ChapterSilence => style(label).yellow(),
        _ => style(label).red().bold(),
    }
}

/// One-line description of the finding behind a verdict's status.
pub fn describe(verdict: &ScanVerdict) -> String {
    match verdict.status() {
        ScanStatus::Error => verdict.error.clone().unwrap_or_default(),
        ScanStatus::MissingAudio => "no audio stream".to_string(),
        ScanStatus::Corrupt => "decoder reported damaged data".to_string(),
        ScanStatus::Truncated => format!(
            "audio ends near {} of {}",
            format_duration(verdict.actual_duration),
            format_duration(verdict.claimed_duration)
        ),
        ScanStatus::ChapterSilence => {
            let chapters: Vec<String> = verdict
                .chapter_silence_findings
                .iter()
                .map(|f| {
                    format!(
                        "\"{}\" ({:.1}s)",
                        f.chapter.title, f.silence.duration_seconds
                    )
                })
                .collect();
            format!("silence after {}", chapters.join(", "))
        }
        ScanStatus::Silence => {
            let longest = verdict
                .longest_silence()
                .map(|s| {
                    format!(
                        ", longest {:.1}s at {}",
                        s.duration_seconds,
                        format_timestamp(s.start_seconds)
                    )
                })
                .unwrap_or_default();
            format!("{} long silences{}", verdict.silence_intervals.len(), longest)
        }
        ScanStatus::Ok => format_duration(verdict.claimed_duration),
    }
}

/// Print per-file results and a status tally.
pub fn print_summary(verdicts: &[ScanVerdict], elapsed: Duration) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                      Audiobook Scan Results                    ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();

    for verdict in verdicts {
        let status = verdict.status();
        *counts.entry(status.to_string()).or_default() += 1;
        println!(
            "  {:<16} {}",
            styled_status(status),
            style(&verdict.file_name).cyan()
        );
        if status.is_issue() {
            println!("  {:<16} {}", "", describe(verdict));
        }
    }

    let clean = verdicts.iter().filter(|v| v.is_clean()).count();
    println!();
    println!("  Files:   {}", verdicts.len());
    println!("  Clean:   {}", style(clean).green());
    for (status, count) in &counts {
        if status != &ScanStatus::Ok.to_string() {
            println!("  {:<8} {}", format!("{status}:"), count);
        }
    }
    println!("  Time:    {:.1}s", elapsed.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

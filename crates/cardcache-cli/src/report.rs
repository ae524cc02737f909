//! Human-readable summaries printed to stdout at the end of each command.

use chrono::Local;

use cardcache_core::{Analysis, CacheKey, CacheStats, KeyRange, RunStatistics, VerifyReport};

/// Keys listed inline before the rest is collapsed into a count.
const MAX_LISTED_KEYS: usize = 20;

pub fn print_run(range: KeyRange, stats: &RunStatistics) {
    println!();
    println!("Download summary ({})", range);
    println!("  Processed:   {:>6}", stats.total);
    println!("  Success:     {:>6}", stats.success);
    println!("  Empty:       {:>6}", stats.empty);
    println!("  Skipped:     {:>6}", stats.skipped);
    println!("  Failed:      {:>6}", stats.failed);
    println!("  Images:      {:>6}", stats.images);
    if stats.cancelled {
        println!("  Interrupted before every key was processed");
    }
}

pub fn print_analysis(range: KeyRange, analysis: &Analysis) {
    println!();
    println!("Cache analysis ({}, {} keys)", range, analysis.total());
    print_key_row("Complete", &analysis.complete);
    print_key_row("Incomplete", &analysis.incomplete);
    print_key_row("Empty", &analysis.empty);
    print_key_row("Missing", &analysis.missing);
}

fn print_key_row(label: &str, keys: &[CacheKey]) {
    println!("  {:<12} {:>6}", format!("{}:", label), keys.len());
    if !keys.is_empty() && label != "Complete" {
        println!("    {}", format_keys(keys));
    }
}

pub fn print_verify(report: &VerifyReport) {
    println!();
    for issue in &report.issues {
        println!("  {} {}", issue.key, issue.problem);
    }
    if report.is_clean() {
        println!("Verified {} key(s), no problems found", report.checked);
    } else {
        println!(
            "Verified {} key(s), {} problem(s) found",
            report.checked,
            report.issues.len()
        );
    }
}

pub fn print_stats(range: KeyRange, stats: &CacheStats) {
    let last_update = stats
        .last_update
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());

    println!();
    println!("Cache statistics ({})", range);
    println!("  Complete:    {:>6}", stats.complete);
    println!("  Empty:       {:>6}", stats.empty);
    println!("  Incomplete:  {:>6}", stats.incomplete);
    println!("  Missing:     {:>6}", stats.missing);
    println!("  Images:      {:>6}", stats.images);
    println!("  Disk usage:  {:>6}", format_bytes(stats.bytes));
    println!("  Last update: {}", last_update);
}

pub fn print_removed(what: &str, removed: &[CacheKey]) {
    println!();
    println!("Removed {} {} key(s)", removed.len(), what);
    if !removed.is_empty() {
        println!("  {}", format_keys(removed));
    }
}

fn format_keys(keys: &[CacheKey]) -> String {
    let shown: Vec<String> = keys
        .iter()
        .take(MAX_LISTED_KEYS)
        .map(|k| k.get().to_string())
        .collect();
    let mut line = shown.join(", ");
    if keys.len() > MAX_LISTED_KEYS {
        line.push_str(&format!(" ... and {} more", keys.len() - MAX_LISTED_KEYS));
    }
    line
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(range: std::ops::RangeInclusive<u32>) -> Vec<CacheKey> {
        range.filter_map(CacheKey::new).collect()
    }

    #[test]
    fn test_format_keys_collapses_long_lists() {
        assert_eq!(format_keys(&keys(1..=3)), "1, 2, 3");
        let long = format_keys(&keys(1..=25));
        assert!(long.starts_with("1, 2, 3"));
        assert!(long.ends_with("... and 5 more"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}

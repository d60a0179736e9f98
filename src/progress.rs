//! Progress reporting for the catalogue crawler
//!
//! Everything here writes to stderr; stdout carries only the artifact paths
//! handed to the next pipeline stage.

use crate::walker::{CrawlProgress, CrawlReport};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner showing live crawl counters
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(spinner) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &CrawlProgress) {
        let msg = format!(
            "Dirs: {} | Seen: {} | New: {} ({}) | Skipped: {} | Abandoned: {} | Rate: {:.1} dirs/s",
            format_number(progress.dirs_listed),
            format_number(progress.files_seen),
            format_number(progress.files_new),
            format_size(progress.bytes_new, BINARY),
            format_number(progress.skipped),
            progress.abandoned,
            progress.dirs_per_second(),
        );

        self.bar.set_message(msg);
    }

    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print a summary of the crawl to stderr
pub fn print_summary(report: &CrawlReport) {
    let secs = report.duration.as_secs_f64();

    eprintln!();
    eprintln!("{}", style("Crawl Complete").green().bold());
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(report.dirs_listed)
    );
    eprintln!(
        "  {} {} seen, {} new ({})",
        style("Files:").bold(),
        format_number(report.files_seen),
        format_number(report.files_new),
        format_size(report.bytes_new, BINARY)
    );
    eprintln!(
        "  {} {} resumed, {} excluded, {} ignored",
        style("Skipped:").bold(),
        format_number(report.skipped_resume),
        format_number(report.excluded),
        format_number(report.ignored)
    );
    eprintln!("  {} {:.1}s", style("Duration:").bold(), secs);
    if !report.abandoned.is_empty() {
        eprintln!(
            "  {} {}",
            style("Abandoned:").yellow().bold(),
            report.abandoned.len()
        );
        for subtree in &report.abandoned {
            eprintln!("    {} ({})", subtree.path, style(&subtree.reason).dim());
        }
    }

    let store_size = std::fs::metadata(&report.store_path).map(|m| m.len()).ok();
    match store_size {
        Some(size) => eprintln!(
            "  {} {} ({} files, {})",
            style("Catalogue:").bold(),
            report.store_path.display(),
            format_number(report.catalogued),
            format_size(size, BINARY)
        ),
        None => eprintln!(
            "  {} {}",
            style("Catalogue:").bold(),
            report.store_path.display()
        ),
    }
    eprintln!("  {} {}", style("Log:").bold(), report.log_path.display());
    eprintln!();
}

/// Print a header at the start of the crawl to stderr
pub fn print_header(source: &str, root: &str, workers: usize, output: &str) {
    eprintln!();
    eprintln!(
        "{} {}",
        style("sftp-catalogue").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("Source:").bold(), source);
    eprintln!("  {} {}", style("Root:").bold(), root);
    eprintln!("  {} {}", style("Workers:").bold(), workers);
    eprintln!("  {} {}", style("Output:").bold(), output);
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }
}

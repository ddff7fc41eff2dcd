//! Terminal output: status lines, sizes and durations, the build summary.
//!
//! Everything goes to stderr so stdout stays free for piping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use console::Term;
use owo_colors::{OwoColorize, Style};
use tote_bundler::BuildReport;

static COLORS: AtomicBool = AtomicBool::new(true);

/// Decide once whether to color output; `--no-color` always wins.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

/// `NO_COLOR` disables, `FORCE_COLOR` enables, otherwise color when stderr is a terminal.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

fn paint(text: &str, style: Style) -> String {
    if COLORS.load(Ordering::Relaxed) {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

pub fn success(message: &str) {
    eprintln!("{} {}", paint("✓", Style::new().green().bold()), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", paint("ℹ", Style::new().blue().bold()), message);
}

pub fn warning(message: &str) {
    eprintln!(
        "{} {}",
        paint("⚠", Style::new().yellow().bold()),
        paint(message, Style::new().yellow())
    );
}

pub fn error(message: &str) {
    eprintln!(
        "{} {}",
        paint("✗", Style::new().red().bold()),
        paint(message, Style::new().red())
    );
}

/// Human-readable size: `0 B`, `500 B`, `1.50 KB`, `2.00 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

/// Human-readable duration: `50ms`, `1.50s`, `2m 5s`.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One summary row per manifest entry, then the totals.
pub fn summary_lines(report: &BuildReport) -> Vec<String> {
    let width = report
        .manifest
        .iter()
        .map(|(_, entry)| entry.output_path.len())
        .max()
        .unwrap_or(0);

    let mut lines: Vec<String> = report
        .manifest
        .iter()
        .map(|(source, entry)| {
            format!(
                "  {} {:<width$}  {:>10}  {}",
                paint("▸", Style::new().blue()),
                entry.output_path,
                format_size(entry.size),
                paint(&format!("<- {source}"), Style::new().dimmed()),
            )
        })
        .collect();

    lines.push(format!(
        "  {} {} files, {} in {}",
        paint("Total:", Style::new().bold()),
        report.manifest.len(),
        paint(&format_size(report.manifest.total_size()), Style::new().green()),
        paint(&format_duration(report.duration), Style::new().green()),
    ));
    lines
}

pub fn print_build_summary(report: &BuildReport) {
    let rule = "─".repeat((Term::stderr().size().1 as usize).min(80));

    eprintln!("\n{}", paint(&format!("Build summary ({})", report.mode), Style::new().bold().underline()));
    eprintln!("{rule}");
    for line in summary_lines(report) {
        eprintln!("{line}");
    }
    eprintln!("{rule}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tote_bundler::{Manifest, ManifestEntry};

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1_048_576), "1.00 MB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn summary_lists_every_output() {
        init_colors(true);
        let mut manifest = Manifest::new();
        manifest.insert(
            "src/main.js",
            ManifestEntry {
                output_path: "js/app.1a2b3c4d.js".to_string(),
                hash: "00".repeat(32),
                size: 2048,
            },
        );
        let report = BuildReport {
            manifest,
            manifest_path: "build/manifest.json".into(),
            out_dir: "build".into(),
            mode: "production".to_string(),
            history: Vec::new(),
            duration: Duration::from_millis(12),
        };

        let lines = summary_lines(&report);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("js/app.1a2b3c4d.js"));
        assert!(lines[0].contains("2.00 KB"));
        assert!(lines[0].contains("<- src/main.js"));
        assert!(lines[1].contains("1 files, 2.00 KB in 12ms"));
    }
}

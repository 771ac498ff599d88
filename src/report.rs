//! Run report
//!
//! Renders the outcome ledger into the human-readable status file the job
//! commits back to its repository. The timestamp is pinned to UTC+8, where
//! the operators read it.

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use tracing::info;

use crate::outcome::{display_tag, OutcomeBook};

/// Where the report lands, relative to the working directory.
pub const REPORT_PATH: &str = "README.md";

/// Current time in the report's fixed UTC+8 offset.
pub fn report_now() -> DateTime<FixedOffset> {
    let utc8 = FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset");
    Utc::now().with_timezone(&utc8)
}

/// Render the report body. Pure: the same ledger and timestamp produce the
/// same text.
pub fn render(book: &OutcomeBook, now: DateTime<FixedOffset>) -> String {
    let timestamp = now.format("%Y-%m-%d %H:%M:%S");
    let total = book.len();

    let mut out = String::new();
    out.push_str("# Weirdhost Auto Renewal & Startup\n\n");
    out.push_str(&format!("**Last run**: `{timestamp}` (UTC+8)\n\n"));
    out.push_str("## Results\n\n");
    out.push_str("| Server | Renewal | Startup |\n");
    out.push_str("|--------|---------|--------|\n");

    for (id, outcome) in book.entries() {
        out.push_str(&format!(
            "| `{}` | {} | {} |\n",
            id,
            display_tag(outcome.renew.tag()),
            display_tag(outcome.start.tag()),
        ));
    }

    out.push_str("\n## Summary\n\n");
    out.push_str(&format!("- Servers: {total}\n"));
    out.push_str(&format!(
        "- Renewed: {}/{total}\n",
        book.renew_success_count()
    ));
    out.push_str(&format!(
        "- Started: {}/{total}\n",
        book.start_success_count()
    ));

    out
}

/// Write the report file.
pub fn write(book: &OutcomeBook, path: &str) -> anyhow::Result<()> {
    let body = render(book, report_now());
    std::fs::write(path, body).with_context(|| format!("writing report to {path}"))?;
    info!("Report written to {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_target_list;
    use crate::outcome::{OutcomeBook, RenewOutcome, StartOutcome, TargetOutcome};

    fn sample_book() -> OutcomeBook {
        let targets = parse_target_list("https://h/server/a,https://h/server/b");
        let mut book = OutcomeBook::seeded(&targets);
        book.record(
            "a",
            TargetOutcome {
                renew: RenewOutcome::Success,
                start: StartOutcome::AlreadyStarted,
            },
        );
        book
    }

    fn table_rows(report: &str) -> Vec<&str> {
        report
            .lines()
            .filter(|line| line.starts_with("| `"))
            .collect()
    }

    #[test]
    fn report_has_one_row_per_target_in_order() {
        let now = report_now();
        let report = render(&sample_book(), now);
        let rows = table_rows(&report);

        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains("| `a` |"));
        assert!(rows[0].contains("✅ Renewed"));
        assert!(rows[0].contains("🔄 Already running"));
        assert!(rows[1].contains("| `b` |"));
        assert!(rows[1].contains("⏸️ Not executed"));
    }

    #[test]
    fn rows_are_identical_across_renders() {
        let book = sample_book();
        let first = render(&book, report_now());
        let second = render(&book, report_now());
        assert_eq!(table_rows(&first), table_rows(&second));
    }

    #[test]
    fn summary_counts_successes_over_total() {
        let report = render(&sample_book(), report_now());
        assert!(report.contains("- Servers: 2\n"));
        assert!(report.contains("- Renewed: 1/2\n"));
        assert!(report.contains("- Started: 1/2\n"));
    }
}

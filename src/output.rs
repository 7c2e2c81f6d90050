//! Output formatting utilities

use crate::decision::{ComparisonDetail, Decision, FileStatus, Outcome, SchemaIssueKind};
use crate::error::Result;
use crate::fingerprint::FileFingerprint;
use crate::lifecycle::{CleanupStats, Snapshot};
use crate::state::Baseline;
use std::fmt::Write;

/// Pretty printer for snapgate output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print a run decision with its per-file comparison
    pub fn print_decision(decision: &Decision) {
        println!(
            "{} {}: {}",
            outcome_emoji(decision.outcome),
            decision.outcome.to_string().to_uppercase(),
            decision.version
        );
        println!("├─ Reason: {}", decision.reason);
        println!("├─ Message: {}", decision.message);
        println!(
            "├─ Baseline: {}",
            if decision.baseline_present { "present" } else { "none" }
        );

        if !decision.unexpected_files.is_empty() {
            println!("├─ Unexpected files: {}", decision.unexpected_files.join(", "));
        }
        for issue in &decision.schema_issues {
            match issue.kind {
                SchemaIssueKind::MissingExpected => println!(
                    "├─ Missing columns in {}: {}",
                    issue.file_name,
                    issue.missing_columns.join(", ")
                ),
                SchemaIssueKind::BaselineDrift => println!(
                    "├─ Header changed in {}: -[{}] +[{}]",
                    issue.file_name,
                    issue.missing_columns.join(", "),
                    issue.added_columns.join(", ")
                ),
            }
        }

        if decision.details.is_empty() {
            println!("└─ Files compared: 0");
            return;
        }

        println!("└─ Files compared: {}", decision.details.len());
        for (i, detail) in decision.details.iter().enumerate() {
            let prefix = if i == decision.details.len() - 1 { "   └─" } else { "   ├─" };
            println!("{} {} {}", prefix, status_marker(detail.status), describe_detail(detail));
        }
    }

    /// Print snapshot list
    pub fn print_snapshot_list(snapshots: &[Snapshot]) {
        if snapshots.is_empty() {
            println!("No snapshots found.");
            return;
        }

        println!("📸 Snapshots:");
        for (i, snapshot) in snapshots.iter().enumerate() {
            let prefix = if i == snapshots.len() - 1 { "└─" } else { "├─" };
            println!("{} {} ({})", prefix, snapshot.version, snapshot.state);
        }
    }

    /// Print the stored baseline
    pub fn print_baseline(baseline: Option<&Baseline>) {
        let Some(baseline) = baseline else {
            println!("No baseline recorded yet.");
            return;
        };

        println!("📊 Baseline: {} files", baseline.len());
        let entries: Vec<&FileFingerprint> = baseline.iter().collect();
        for (i, fp) in entries.iter().enumerate() {
            let last = i == entries.len() - 1;
            let prefix = if last { "└─" } else { "├─" };
            let child = if last { "   " } else { "│  " };
            println!("{} {}", prefix, fp.file_name);
            println!("{}├─ Hash: {}", child, short_hash(&fp.hash));
            println!("{}├─ Rows: {} ({} data)", child, fp.total_rows, fp.data_rows);
            println!("{}└─ Captured: {}", child, fp.captured_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }

    /// Print the result of a pruning pass
    pub fn print_cleanup(stats: &CleanupStats) {
        if stats.removed.is_empty() {
            println!("🧹 Nothing to clean up.");
            return;
        }

        println!("🧹 Removed {} snapshots", stats.removed.len());
        for (i, version) in stats.removed.iter().enumerate() {
            let prefix = if i == stats.removed.len() - 1 { "└─" } else { "├─" };
            println!("{} {}", prefix, version);
        }
        println!("Freed {}", format_bytes(stats.bytes_freed));
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    pub fn format_snapshot_list(snapshots: &[Snapshot]) -> Result<String> {
        let entries: Vec<serde_json::Value> = snapshots
            .iter()
            .map(|s| {
                serde_json::json!({
                    "version": s.version.name(),
                    "number": s.version.number(),
                    "state": s.state,
                    "path": s.path.display().to_string(),
                })
            })
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    pub fn format_cleanup(stats: &CleanupStats) -> Result<String> {
        let json = serde_json::json!({
            "removed": stats.removed.iter().map(|v| v.name()).collect::<Vec<_>>(),
            "bytes_freed": stats.bytes_freed,
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }
}

/// Renders decisions as ingestion log sections
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub const HEADER: &'static str = "# Ingestion Log\n\n---\n\n";

    /// One `## <date> — Change Detection Run` section, ending with a `---` rule
    pub fn render_decision(decision: &Decision, source: &str) -> String {
        let mut out = String::new();
        let action = decision.outcome.to_string().to_uppercase();

        // Writing to a String cannot fail
        let _ = writeln!(out, "## {} — Change Detection Run\n", decision.timestamp.format("%Y-%m-%d"));
        let _ = writeln!(out, "**Source:** {}  ", source);
        let _ = writeln!(out, "**Run type:** Automated comparison  ");
        let _ = writeln!(out, "**Dataset version:** {}  ", decision.version);
        let _ = writeln!(out, "**Action:** {} - {}\n", action, decision.message);

        let _ = writeln!(out, "### Comparison results");
        out.push_str(&Self::render_table(&decision.details));
        out.push('\n');

        let _ = writeln!(out, "### Decision details");
        let _ = writeln!(out, "- **Decision:** {}", action);
        let _ = writeln!(out, "- **Reason:** {} ({})", decision.message, decision.reason);
        let _ = writeln!(out, "- **Run ID:** {}", decision.run_id);
        let _ = writeln!(out, "- **Timestamp:** {}", decision.timestamp.to_rfc3339());
        let _ = writeln!(out, "- **Baseline:** {}", decision.baseline_present);
        let _ = writeln!(out, "- **Files compared:** {}", decision.details.len());
        let _ = writeln!(
            out,
            "- **Previous files:** {}",
            decision.details.iter().filter(|d| d.previous.is_some()).count()
        );
        let _ = writeln!(
            out,
            "- **Current files:** {}\n",
            decision.details.iter().filter(|d| d.current.is_some()).count()
        );

        let _ = writeln!(out, "### Notes");
        let _ = writeln!(
            out,
            "- Previous state: {}",
            if decision.baseline_present { "read from metadata/fingerprints" } else { "none (first run)" }
        );
        let _ = writeln!(out, "- Schema issues: {}", decision.schema_issues.len());
        if !decision.unexpected_files.is_empty() {
            let _ = writeln!(out, "- Unexpected files: {}", decision.unexpected_files.join(", "));
        }
        out.push('\n');

        let _ = writeln!(out, "**Status:** {} {}\n", outcome_emoji(decision.outcome), action);
        out.push_str("---\n\n");
        out
    }

    fn render_table(details: &[ComparisonDetail]) -> String {
        let mut table = String::from(
            "| File | Previous Hash | Current Hash | Hash Match | Previous Rows | Current Rows | Row Match |\n",
        );
        table.push_str(
            "|------|---------------|--------------|------------|---------------|--------------|-----------|\n",
        );

        for detail in details {
            let prev = detail.previous.as_ref();
            let curr = detail.current.as_ref();
            let (hash_match, row_match) = match (prev, curr) {
                (Some(p), Some(c)) => (
                    check_mark(p.hash == c.hash),
                    check_mark(p.data_rows == c.data_rows),
                ),
                _ => ("N/A", "N/A"),
            };
            let _ = writeln!(
                table,
                "| {} | {} | {} | {} | {} | {} | {} |",
                detail.file_name,
                prev.map(|f| short_hash(&f.hash)).unwrap_or_else(|| "N/A".to_string()),
                curr.map(|f| short_hash(&f.hash)).unwrap_or_else(|| "N/A".to_string()),
                hash_match,
                prev.map(|f| f.data_rows.to_string()).unwrap_or_else(|| "N/A".to_string()),
                curr.map(|f| f.data_rows.to_string()).unwrap_or_else(|| "N/A".to_string()),
                row_match,
            );
        }
        table
    }
}

fn check_mark(matches: bool) -> &'static str {
    if matches {
        "✅"
    } else {
        "❌"
    }
}

fn outcome_emoji(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Ingest => "✅",
        Outcome::Skip => "⏭️",
        Outcome::Alert => "⚠️",
    }
}

fn status_marker(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Unchanged => "✅",
        FileStatus::Changed => "🔄",
        FileStatus::New => "🆕",
        FileStatus::Missing => "❌",
    }
}

fn describe_detail(detail: &ComparisonDetail) -> String {
    match (&detail.previous, &detail.current) {
        (Some(prev), Some(curr)) if detail.status == FileStatus::Changed => format!(
            "{}: changed ({} → {} rows, {:+})",
            detail.file_name, prev.data_rows, curr.data_rows, detail.row_count_delta
        ),
        (_, Some(curr)) => format!("{}: {} ({} rows)", detail.file_name, detail.status, curr.data_rows),
        (_, None) => format!("{}: missing", detail.file_name),
    }
}

/// First 12 hex digits of a hash, followed by `...`
pub fn short_hash(hash: &str) -> String {
    format!("{}...", hash.chars().take(12).collect::<String>())
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

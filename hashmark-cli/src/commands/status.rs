//! `hashmark status`: change visibility without touching the destination.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use hashmark_core::{ChangeRecord, ChangeStatus, DigestAlgorithm};
use hashmark_engine::{pipeline, ChangeTally, StatusReport};

use super::ProjectArgs;

/// Arguments for `hashmark status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// List unmodified entries too.
    #[arg(long)]
    pub all: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, project_root: &Path) -> Result<()> {
        let project = self.project.load(project_root)?;
        let report = pipeline::status(&project).with_context(|| {
            format!("status check failed for '{}'", project.source.display())
        })?;

        if self.json {
            print_json(&report)?;
        } else {
            print_table(&report, self.all);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusReportJson<'a> {
    algorithm: DigestAlgorithm,
    last_run_at: Option<String>,
    last_run_age: String,
    needs_full_run: bool,
    summary: StatusSummaryJson,
    changes: &'a [ChangeRecord],
}

#[derive(Serialize)]
struct StatusSummaryJson {
    added: usize,
    modified: usize,
    removed: usize,
    unmodified: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "status")]
    status: String,
}

fn print_json(report: &StatusReport) -> Result<()> {
    let tally = ChangeTally::from_records(&report.changes);
    let payload = StatusReportJson {
        algorithm: report.algorithm,
        last_run_at: report.last_run.map(|t| t.to_rfc3339()),
        last_run_age: last_run_age(report.last_run),
        needs_full_run: report.needs_full_run(),
        summary: StatusSummaryJson {
            added: tally.added,
            modified: tally.modified,
            removed: tally.removed,
            unmodified: tally.unmodified,
        },
        changes: &report.changes,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(report: &StatusReport, all: bool) {
    let tally = ChangeTally::from_records(&report.changes);
    println!(
        "hashmark v{} | {} | last run {} | {} added | {} modified | {} removed | {} unmodified",
        env!("CARGO_PKG_VERSION"),
        report.algorithm,
        last_run_age(report.last_run),
        tally.added,
        tally.modified,
        tally.removed,
        tally.unmodified,
    );

    if let Some(previous) = report.last_algorithm.filter(|a| *a != report.algorithm) {
        println!(
            "{}",
            format!(
                "algorithm changed from {previous} to {}; next digest rebuilds everything",
                report.algorithm
            )
            .yellow()
        );
    }

    let rows: Vec<StatusTableRow> = report
        .changes
        .iter()
        .filter(|r| all || r.status != ChangeStatus::Unmodified)
        .map(|r| StatusTableRow {
            path: r.path.display().to_string(),
            status: status_label(r.status),
        })
        .collect();

    if rows.is_empty() {
        println!("{}", "Everything up to date.".green());
        return;
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    if tally.pending() > 0 {
        println!("Run 'hashmark digest' to update the destination.");
    }
}

fn status_label(status: ChangeStatus) -> String {
    match status {
        ChangeStatus::Added => "ADDED".green().bold().to_string(),
        ChangeStatus::Modified => "MODIFIED".yellow().bold().to_string(),
        ChangeStatus::Removed => "REMOVED".red().bold().to_string(),
        ChangeStatus::Unmodified => "UNMODIFIED".bright_black().to_string(),
    }
}

fn last_run_age(last_run: Option<DateTime<Utc>>) -> String {
    match last_run {
        Some(at) => format!("{} ago", format_datetime_age(at)),
        None => "never".to_string(),
    }
}

/// Compact age: `42s`, `5m`, `3h`, `2d`.
fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn age_buckets() {
        let now = Utc::now();
        assert_eq!(format_datetime_age(now - Duration::seconds(5)), "5s");
        assert_eq!(format_datetime_age(now - Duration::minutes(5)), "5m");
        assert_eq!(format_datetime_age(now - Duration::hours(3)), "3h");
        assert_eq!(format_datetime_age(now - Duration::days(2)), "2d");
    }

    #[test]
    fn future_timestamp_is_zero_age() {
        assert_eq!(format_datetime_age(Utc::now() + Duration::hours(1)), "0s");
    }
}

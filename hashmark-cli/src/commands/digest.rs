//! `hashmark digest`: place stamped copies and sidecars for the sources.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use hashmark_core::{DerivedArtifact, ProjectConfig};
use hashmark_engine::{
    pipeline::{self, PipelineOptions, PipelineResult},
    RunMode,
};

use super::ProjectArgs;

/// Arguments for `hashmark digest`.
#[derive(Args, Debug)]
pub struct DigestArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Clear the destination and rebuild it from scratch.
    #[arg(long, conflicts_with = "changes")]
    pub full: bool,

    /// JSON change set from an outer build tool instead of detecting
    /// changes: `[{"path": "a.txt", "status": "modified"}, ...]`.
    #[arg(long, value_name = "FILE")]
    pub changes: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl DigestArgs {
    pub fn run(self, project_root: &Path) -> Result<()> {
        let project = self.project.load(project_root)?;
        let changes = match &self.changes {
            Some(path) => Some(
                pipeline::load_changes(path)
                    .with_context(|| format!("failed to read change set '{}'", path.display()))?,
            ),
            None => None,
        };

        let options = PipelineOptions {
            full: self.full,
            changes,
            cancel: None,
        };
        let result = pipeline::run(&project, options).with_context(|| {
            format!("digest failed for '{}'", project.source.display())
        })?;

        if self.json {
            print_json(&result)?;
        } else {
            print_results(&project, &result);
        }

        let failed = result.summary.errored_count();
        if failed > 0 {
            bail!("{failed} of the entries failed");
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct DigestReportJson<'a> {
    mode: &'static str,
    reason: Option<String>,
    placed: &'a [DerivedArtifact],
    removed: Vec<String>,
    deleted: Vec<String>,
    skipped: usize,
    not_started: usize,
    failures: Vec<FailureJson>,
    manifest_saved: bool,
}

#[derive(Serialize)]
struct FailureJson {
    path: String,
    error: String,
}

fn print_json(result: &PipelineResult) -> Result<()> {
    let summary = &result.summary;
    let payload = DigestReportJson {
        mode: mode_key(&result.mode),
        reason: match &result.mode {
            RunMode::Full(reason) => Some(reason.to_string()),
            RunMode::Incremental => None,
        },
        placed: &summary.placed,
        removed: display_all(&summary.removed),
        deleted: display_all(&summary.deleted),
        skipped: summary.skipped_count(),
        not_started: summary.not_started,
        failures: summary
            .failures
            .iter()
            .map(|f| FailureJson {
                path: f.path.display().to_string(),
                error: f.error.to_string(),
            })
            .collect(),
        manifest_saved: result.manifest_saved,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize digest JSON")?
    );
    Ok(())
}

fn print_results(project: &ProjectConfig, result: &PipelineResult) {
    let summary = &result.summary;
    let dest = project.digest.dest.display();
    let mode = match &result.mode {
        RunMode::Full(reason) => format!("full, {reason}"),
        RunMode::Incremental => "incremental".to_string(),
    };

    if summary.placed.is_empty() && summary.deleted.is_empty() && summary.failures.is_empty() {
        println!("✓ '{dest}' up to date ({mode})");
        return;
    }

    let mark = if summary.is_success() {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "{mark} '{dest}' digested with {} ({mode}): {} placed, {} deleted, {} skipped",
        project.digest.algorithm,
        summary.placed_count(),
        summary.deleted_count(),
        summary.skipped_count(),
    );

    for artifact in &summary.placed {
        let stamped = artifact
            .stamped
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  ✎  {} → {}", artifact.relative.display(), stamped);
    }
    for path in &summary.removed {
        println!("  -  {}", path.display());
    }
    for failure in &summary.failures {
        println!(
            "  {}  {}: {}",
            "✗".red(),
            failure.path.display(),
            failure.error
        );
    }
    if summary.not_started > 0 {
        println!("  {} entries not started", summary.not_started);
    }
    if !result.manifest_saved {
        println!("{}", "run did not finish; state not saved".yellow());
    }
}

fn mode_key(mode: &RunMode) -> &'static str {
    match mode {
        RunMode::Full(_) => "full",
        RunMode::Incremental => "incremental",
    }
}

fn display_all(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

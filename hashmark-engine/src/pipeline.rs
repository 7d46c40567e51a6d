//! Shared digest pipeline entrypoint used by the CLI.
//!
//! walk → load manifest → choose full/incremental → reconcile → save manifest.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use hashmark_core::config::STATE_DIR;
use hashmark_core::{ChangeRecord, DigestAlgorithm, ProjectConfig, SourceEntry};

use crate::changes;
use crate::error::{io_err, EngineError};
use crate::manifest::{self, RunManifest};
use crate::reconciler::{CancelToken, Reconciler, RunSummary};
use crate::walker::Walker;

/// Why a run cleared the destination instead of working incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullReason {
    /// `--full` on the command line.
    Requested,
    /// No manifest from a previous run.
    NoManifest,
    /// The previous run used a different algorithm.
    AlgorithmChanged {
        from: DigestAlgorithm,
        to: DigestAlgorithm,
    },
}

impl fmt::Display for FullReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FullReason::Requested => f.write_str("requested"),
            FullReason::NoManifest => f.write_str("no previous run"),
            FullReason::AlgorithmChanged { from, to } => {
                write!(f, "algorithm changed from {from} to {to}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Full(FullReason),
    Incremental,
}

impl RunMode {
    pub fn is_full(&self) -> bool {
        matches!(self, RunMode::Full(_))
    }
}

/// Knobs for a single pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Force a full run.
    pub full: bool,
    /// Change set supplied by an outer build tool. `None` means detect
    /// changes against the manifest.
    pub changes: Option<Vec<ChangeRecord>>,
    pub cancel: Option<CancelToken>,
}

#[derive(Debug)]
pub struct PipelineResult {
    pub mode: RunMode,
    /// The change set handed to the reconciler (empty on full runs).
    pub changes: Vec<ChangeRecord>,
    pub summary: RunSummary,
    /// Whether the manifest was written. A cancelled run leaves the previous
    /// one in place.
    pub manifest_saved: bool,
}

/// Change status of the source tree without touching the destination.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub algorithm: DigestAlgorithm,
    /// When the previous run happened, if there was one.
    pub last_run: Option<DateTime<Utc>>,
    /// Algorithm of the previous run, if there was one.
    pub last_algorithm: Option<DigestAlgorithm>,
    pub changes: Vec<ChangeRecord>,
}

impl StatusReport {
    /// The next `digest` would clear the destination.
    pub fn needs_full_run(&self) -> bool {
        self.last_algorithm != Some(self.algorithm)
    }
}

/// Run the digest pipeline for a project.
///
/// This is the canonical entrypoint for `hashmark digest`.
pub fn run(project: &ProjectConfig, options: PipelineOptions) -> Result<PipelineResult, EngineError> {
    let started = Utc::now();
    let config = &project.digest;
    let entries = walk(project)?;
    let manifest_path = project.manifest_path();
    let previous = manifest::load_at(&manifest_path)?;

    let mode = choose_mode(&options, previous.as_ref(), config.algorithm);
    let changes = match (&mode, options.changes) {
        (RunMode::Full(reason), _) => {
            info!("full run into {} ({reason})", config.dest.display());
            if let FullReason::AlgorithmChanged { .. } = reason {
                warn!("{reason}; clearing {}", config.dest.display());
            }
            Vec::new()
        }
        (RunMode::Incremental, Some(explicit)) => explicit,
        (RunMode::Incremental, None) => {
            let empty = RunManifest::new(config.algorithm);
            changes::detect(&entries, previous.as_ref().unwrap_or(&empty), config)
        }
    };

    let summary = {
        let mut reconciler = Reconciler::new(config);
        if let Some(manifest) = previous.as_ref() {
            reconciler = reconciler.with_manifest(manifest);
        }
        if let Some(cancel) = options.cancel {
            reconciler = reconciler.with_cancel_token(cancel);
        }
        if mode.is_full() {
            reconciler.run(&entries, None)?
        } else {
            reconciler.run(&entries, Some(&changes))?
        }
    };

    let manifest_saved = if summary.cancelled {
        warn!("run cancelled; keeping previous manifest");
        false
    } else {
        let mut manifest = previous.unwrap_or_else(|| RunManifest::new(config.algorithm));
        manifest.record(&summary, config.algorithm);
        manifest.generated_at = started;
        manifest::save_at(&manifest_path, &manifest)?;
        true
    };

    Ok(PipelineResult {
        mode,
        changes,
        summary,
        manifest_saved,
    })
}

/// Classify the source tree against the last run. Read-only.
pub fn status(project: &ProjectConfig) -> Result<StatusReport, EngineError> {
    let config = &project.digest;
    let entries = walk(project)?;
    let previous = manifest::load_at(&project.manifest_path())?;
    let empty = RunManifest::new(config.algorithm);
    let changes = changes::detect(&entries, previous.as_ref().unwrap_or(&empty), config);

    Ok(StatusReport {
        algorithm: config.algorithm,
        last_run: previous.as_ref().map(|m| m.generated_at),
        last_algorithm: previous.as_ref().map(|m| m.algorithm),
        changes,
    })
}

/// Read a change set from a JSON file: `[{"path": "...", "status": "added"}, ...]`.
pub fn load_changes(path: &Path) -> Result<Vec<ChangeRecord>, EngineError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

fn choose_mode(
    options: &PipelineOptions,
    previous: Option<&RunManifest>,
    algorithm: DigestAlgorithm,
) -> RunMode {
    if options.full {
        return RunMode::Full(FullReason::Requested);
    }
    match previous {
        Some(manifest) if manifest.algorithm != algorithm => {
            RunMode::Full(FullReason::AlgorithmChanged {
                from: manifest.algorithm,
                to: algorithm,
            })
        }
        None if options.changes.is_none() => RunMode::Full(FullReason::NoManifest),
        _ => RunMode::Incremental,
    }
}

fn walk(project: &ProjectConfig) -> Result<Vec<SourceEntry>, EngineError> {
    Walker::new(&project.source)
        .include(&project.include)?
        .exclude(&project.exclude)?
        .prune(&project.digest.dest)
        .prune(project.project_root.join(STATE_DIR))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashmark_core::ChangeStatus;

    fn manifest(algorithm: DigestAlgorithm) -> RunManifest {
        RunManifest::new(algorithm)
    }

    #[test]
    fn mode_full_when_requested() {
        let options = PipelineOptions {
            full: true,
            ..PipelineOptions::default()
        };
        let previous = manifest(DigestAlgorithm::Md5);
        assert_eq!(
            choose_mode(&options, Some(&previous), DigestAlgorithm::Md5),
            RunMode::Full(FullReason::Requested)
        );
    }

    #[test]
    fn mode_full_without_manifest() {
        assert_eq!(
            choose_mode(&PipelineOptions::default(), None, DigestAlgorithm::Md5),
            RunMode::Full(FullReason::NoManifest)
        );
    }

    #[test]
    fn mode_full_on_algorithm_change_even_with_explicit_changes() {
        let options = PipelineOptions {
            changes: Some(vec![ChangeRecord::new("a.txt", ChangeStatus::Added)]),
            ..PipelineOptions::default()
        };
        let previous = manifest(DigestAlgorithm::Md5);
        assert_eq!(
            choose_mode(&options, Some(&previous), DigestAlgorithm::Sha1),
            RunMode::Full(FullReason::AlgorithmChanged {
                from: DigestAlgorithm::Md5,
                to: DigestAlgorithm::Sha1,
            })
        );
    }

    #[test]
    fn mode_incremental_with_explicit_changes_and_no_manifest() {
        let options = PipelineOptions {
            changes: Some(Vec::new()),
            ..PipelineOptions::default()
        };
        assert_eq!(
            choose_mode(&options, None, DigestAlgorithm::Md5),
            RunMode::Incremental
        );
    }

    #[test]
    fn mode_incremental_with_matching_manifest() {
        let previous = manifest(DigestAlgorithm::Sha256);
        assert_eq!(
            choose_mode(&PipelineOptions::default(), Some(&previous), DigestAlgorithm::Sha256),
            RunMode::Incremental
        );
    }

    #[test]
    fn full_reason_display() {
        let reason = FullReason::AlgorithmChanged {
            from: DigestAlgorithm::Md5,
            to: DigestAlgorithm::Sha256,
        };
        assert_eq!(reason.to_string(), "algorithm changed from MD5 to SHA256");
    }
}

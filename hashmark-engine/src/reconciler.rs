//! Change reconciler: keeps the destination consistent with the sources.
//!
//! ## Modes
//!
//! - **Full** (no previous state): every entry directly under the
//!   destination root is deleted, then every directory entry is mirrored and
//!   every file entry is digested and placed.
//! - **Incremental** (previous state given): each `(path, status)` record is
//!   applied on its own:
//!
//!   | status       | action                                   |
//!   |--------------|------------------------------------------|
//!   | `removed`    | delete stamped copy + sidecar            |
//!   | `modified`   | delete stale artifacts, then place again |
//!   | `added`      | place                                    |
//!   | `unmodified` | nothing                                  |
//!
//! A content change always changes the stamped file name, so `modified`
//! must delete before it places; otherwise the old stamped copy is orphaned.
//!
//! Per-entry work runs on a bounded rayon pool. Entries touch disjoint
//! destination paths and results are collected in input order.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use hashmark_core::{
    relative_key, ChangeRecord, ChangeStatus, DerivedArtifact, DigestConfig, FailurePolicy,
    SourceEntry,
};

use crate::digester;
use crate::error::{io_err, EngineError};
use crate::manifest::RunManifest;
use crate::placer;

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// A per-entry failure, kept with the relative path it happened on.
#[derive(Debug)]
pub struct EntryFailure {
    pub path: PathBuf,
    pub error: EngineError,
}

/// Outcome of one reconciliation.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Whether the destination was cleared and rebuilt.
    pub full: bool,
    pub placed: Vec<DerivedArtifact>,
    /// Relative paths of directories mirrored at the destination.
    pub directories: Vec<PathBuf>,
    /// Relative paths whose artifacts were removed.
    pub removed: Vec<PathBuf>,
    /// Destination paths actually deleted.
    pub deleted: Vec<PathBuf>,
    pub skipped: usize,
    pub failures: Vec<EntryFailure>,
    /// Entries never started because the run was cancelled or aborted.
    pub not_started: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    pub fn errored_count(&self) -> usize {
        self.failures.len()
    }

    /// No failures and nothing left undone.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.not_started == 0 && !self.cancelled
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag a caller flips to stop a run. Entries already in flight
/// finish; nothing new is started.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Per-entry outcome
// ---------------------------------------------------------------------------

enum Action {
    Placed(DerivedArtifact),
    Mirrored,
    Removed,
    Skipped,
    NotStarted,
}

struct Outcome {
    relative: PathBuf,
    deleted: Vec<PathBuf>,
    result: Result<Action, EngineError>,
}

impl Outcome {
    fn new(relative: &Path, result: Result<Action, EngineError>) -> Self {
        Self {
            relative: relative.to_path_buf(),
            deleted: Vec::new(),
            result,
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Drives the digester and placer for one run.
///
/// The configuration is immutable for the run; the optional manifest is the
/// record of the previous run and is only read.
pub struct Reconciler<'a> {
    config: &'a DigestConfig,
    manifest: Option<&'a RunManifest>,
    cancel: CancelToken,
    halted: AtomicBool,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a DigestConfig) -> Self {
        Self {
            config,
            manifest: None,
            cancel: CancelToken::new(),
            halted: AtomicBool::new(false),
        }
    }

    /// Previous run's manifest, consulted when deleting stale artifacts.
    pub fn with_manifest(mut self, manifest: &'a RunManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reconcile the destination against `entries`.
    ///
    /// `previous` absent means a full run. Per-entry failures are collected
    /// in the summary; only failures that make the whole run meaningless
    /// (clearing the destination, starting the pool) are returned as `Err`.
    pub fn run(
        &self,
        entries: &[SourceEntry],
        previous: Option<&[ChangeRecord]>,
    ) -> Result<RunSummary, EngineError> {
        self.halted.store(false, Ordering::SeqCst);
        let summary = match previous {
            None => self.run_full(entries)?,
            Some(changes) => self.run_incremental(entries, changes)?,
        };

        tracing::info!(
            "reconciled {} ({}): {} placed, {} deleted, {} skipped, {} failed",
            self.config.dest.display(),
            if summary.full { "full" } else { "incremental" },
            summary.placed_count(),
            summary.deleted_count(),
            summary.skipped_count(),
            summary.errored_count(),
        );
        Ok(summary)
    }

    fn run_full(&self, entries: &[SourceEntry]) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary {
            full: true,
            ..RunSummary::default()
        };
        if self.cancel.is_cancelled() {
            summary.cancelled = true;
            summary.not_started = entries.len();
            return Ok(summary);
        }

        summary.deleted = clear_dir(&self.config.dest)?;

        // Directories first: callers guarantee they precede their contents.
        let (dirs, files): (Vec<&SourceEntry>, Vec<&SourceEntry>) =
            entries.iter().partition(|e| e.is_dir());
        for entry in dirs {
            let outcome = self.guarded(&entry.relative, || {
                let result = placer::mirror_dir(entry, &self.config.dest).map(|_| Action::Mirrored);
                Outcome::new(&entry.relative, result)
            });
            self.fold(&mut summary, outcome);
        }

        let outcomes = self.fan_out(&files, |entry| {
            self.guarded(&entry.relative, || {
                Outcome::new(&entry.relative, self.place_file(entry).map(Action::Placed))
            })
        })?;
        for outcome in outcomes {
            self.fold(&mut summary, outcome);
        }

        summary.cancelled = self.cancel.is_cancelled();
        Ok(summary)
    }

    fn run_incremental(
        &self,
        entries: &[SourceEntry],
        changes: &[ChangeRecord],
    ) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary::default();
        let by_key: HashMap<String, &SourceEntry> =
            entries.iter().map(|e| (e.key(), e)).collect();

        // One record per path, last one wins, first-seen order kept.
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, &ChangeRecord> = HashMap::new();
        for record in changes {
            let key = relative_key(&record.path);
            if latest.insert(key.clone(), record).is_none() {
                order.push(key);
            }
        }

        // Removed directories wait until the files under them are gone. A
        // file now sitting where a directory used to be also retires that
        // directory once it is empty.
        let mut work: Vec<(&ChangeRecord, Option<&SourceEntry>)> = Vec::new();
        let mut removed_dirs: Vec<&ChangeRecord> = Vec::new();
        for key in &order {
            let record = latest[key];
            let entry = by_key.get(key).copied();
            if record.status == ChangeStatus::Removed && self.is_mirrored_dir(record) {
                removed_dirs.push(record);
                continue;
            }
            let replaces_dir = matches!(record.status, ChangeStatus::Added | ChangeStatus::Modified)
                && entry.is_some_and(|e| !e.is_dir())
                && self.is_mirrored_dir(record);
            if replaces_dir {
                removed_dirs.push(record);
            }
            work.push((record, entry));
        }

        let outcomes = self.fan_out(&work, |(record, entry)| {
            self.guarded(&record.path, || self.apply(record, *entry))
        })?;
        for outcome in outcomes {
            self.fold(&mut summary, outcome);
        }

        removed_dirs.sort_by_key(|r| std::cmp::Reverse(r.path.components().count()));
        for record in removed_dirs {
            let outcome = self.guarded(&record.path, || self.remove_dir(record));
            self.fold(&mut summary, outcome);
        }

        summary.cancelled = self.cancel.is_cancelled();
        Ok(summary)
    }

    /// Apply one change record. Runs on a worker.
    fn apply(&self, record: &ChangeRecord, entry: Option<&SourceEntry>) -> Outcome {
        match record.status {
            ChangeStatus::Unmodified => Outcome::new(&record.path, Ok(Action::Skipped)),
            ChangeStatus::Removed => {
                let mut outcome = Outcome::new(&record.path, Ok(Action::Removed));
                match self.remove_artifacts(&record.path) {
                    Ok(deleted) => outcome.deleted = deleted,
                    Err(e) => outcome.result = Err(e),
                }
                outcome
            }
            ChangeStatus::Added | ChangeStatus::Modified => {
                let Some(entry) = entry else {
                    return Outcome::new(
                        &record.path,
                        Err(EngineError::MissingSource {
                            path: record.path.clone(),
                        }),
                    );
                };
                if entry.is_dir() {
                    // Whatever a former file at this path left behind goes first.
                    let mut outcome = Outcome::new(&entry.relative, Ok(Action::Mirrored));
                    if self.was_file(&entry.relative) {
                        match self.remove_artifacts(&entry.relative) {
                            Ok(deleted) => outcome.deleted = deleted,
                            Err(e) => {
                                outcome.result = Err(e);
                                return outcome;
                            }
                        }
                    }
                    if let Err(e) = placer::mirror_dir(entry, &self.config.dest) {
                        outcome.result = Err(e);
                    }
                    return outcome;
                }

                let mut outcome = Outcome::new(&entry.relative, Ok(Action::Skipped));
                if record.status == ChangeStatus::Modified && self.was_file(&entry.relative) {
                    match self.remove_artifacts(&entry.relative) {
                        Ok(deleted) => outcome.deleted = deleted,
                        Err(e) => {
                            outcome.result = Err(e);
                            return outcome;
                        }
                    }
                }
                outcome.result = self.place_file(entry).map(Action::Placed);
                outcome
            }
        }
    }

    fn place_file(&self, entry: &SourceEntry) -> Result<DerivedArtifact, EngineError> {
        let content = std::fs::read(&entry.location).map_err(|e| io_err(&entry.location, e))?;
        let digest_hex = digester::digest(&content, self.config.algorithm).to_hex();
        placer::place(
            entry,
            &content,
            &digest_hex,
            &self.config.dest,
            self.config.algorithm,
        )
    }

    /// Delete whatever `relative` owns: the sidecar for the current
    /// algorithm, and, if the manifest says it was placed with another
    /// algorithm, that one too.
    fn remove_artifacts(&self, relative: &Path) -> Result<Vec<PathBuf>, EngineError> {
        let algorithm = self.config.algorithm;
        let recorded = self.manifest.and_then(|m| m.artifact(relative));

        let same = recorded
            .filter(|r| r.algorithm == algorithm)
            .map(|r| r.digest.as_str());
        let mut deleted = placer::remove(relative, &self.config.dest, algorithm, same)?;

        if let Some(other) = recorded.filter(|r| r.algorithm != algorithm) {
            deleted.extend(placer::remove(
                relative,
                &self.config.dest,
                other.algorithm,
                Some(&other.digest),
            )?);
        }
        Ok(deleted)
    }

    /// A file was digested at `relative` before, per the manifest or a
    /// sidecar still sitting in the destination.
    fn was_file(&self, relative: &Path) -> bool {
        let recorded = self.manifest.is_some_and(|m| m.artifact(relative).is_some());
        recorded
            || placer::sidecar_path(relative, &self.config.dest, self.config.algorithm)
                .map(|sidecar| sidecar.is_file())
                .unwrap_or(false)
    }

    fn is_mirrored_dir(&self, record: &ChangeRecord) -> bool {
        let recorded = self
            .manifest
            .is_some_and(|m| m.directories.contains(&relative_key(&record.path)));
        recorded
            || placer::mirrored_dir(&record.path, &self.config.dest)
                .map(|dir| dir.is_dir())
                .unwrap_or(false)
    }

    fn remove_dir(&self, record: &ChangeRecord) -> Outcome {
        let mut outcome = Outcome::new(&record.path, Ok(Action::Removed));
        match placer::remove_dir_if_empty(&record.path, &self.config.dest) {
            Ok(Some(dir)) => outcome.deleted.push(dir),
            Ok(None) => {}
            Err(e) => outcome.result = Err(e),
        }
        outcome
    }

    /// Run `f` over `items` on the worker pool, keeping input order.
    fn fan_out<T, F>(&self, items: &[T], f: F) -> Result<Vec<Outcome>, EngineError>
    where
        T: Sync,
        F: Fn(&T) -> Outcome + Sync + Send,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("hashmark-worker-{i}"));
        if let Some(jobs) = self.config.jobs {
            builder = builder.num_threads(jobs);
        }
        let pool = builder.build()?;
        Ok(pool.install(|| items.par_iter().map(&f).collect()))
    }

    /// Skip work once the run is cancelled or halted by the abort policy;
    /// halt after the first failure under that policy.
    fn guarded(&self, relative: &Path, work: impl FnOnce() -> Outcome) -> Outcome {
        if self.cancel.is_cancelled() || self.halted.load(Ordering::SeqCst) {
            return Outcome::new(relative, Ok(Action::NotStarted));
        }
        let outcome = work();
        if outcome.result.is_err() && self.config.failure_policy == FailurePolicy::Abort {
            self.halted.store(true, Ordering::SeqCst);
        }
        outcome
    }

    fn fold(&self, summary: &mut RunSummary, outcome: Outcome) {
        summary.deleted.extend(outcome.deleted);
        match outcome.result {
            Ok(Action::Placed(artifact)) => summary.placed.push(artifact),
            Ok(Action::Mirrored) => summary.directories.push(outcome.relative),
            Ok(Action::Removed) => summary.removed.push(outcome.relative),
            Ok(Action::Skipped) => summary.skipped += 1,
            Ok(Action::NotStarted) => summary.not_started += 1,
            Err(error) => {
                tracing::warn!("failed: {}: {error}", outcome.relative.display());
                summary.failures.push(EntryFailure {
                    path: outcome.relative,
                    error,
                });
            }
        }
    }
}

/// Delete every entry directly under `dir`, creating `dir` if absent.
/// Returns the deleted top-level paths.
fn clear_dir(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            return Ok(Vec::new());
        }
        Err(e) => return Err(io_err(dir, e)),
    };

    let mut deleted = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
        if file_type.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|e| io_err(&path, e))?;
        } else {
            std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
        deleted.push(path);
    }
    deleted.sort();
    Ok(deleted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

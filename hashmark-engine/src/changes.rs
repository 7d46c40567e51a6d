//! Change detection against the run manifest.
//!
//! Stands in for a build tool's change tracker when none is available.
//!
//! Classification per path:
//! 1. `added`: current entry, no manifest record
//! 2. `modified`: recorded, but the digest differs, the stamped copy /
//!    sidecar (or mirrored directory) is missing from the destination, or
//!    the path switched between file and directory
//! 3. `unmodified`: recorded and intact
//! 4. `removed`: recorded, no current entry
//!
//! Output is sorted by path with removals last.

use std::collections::BTreeSet;
use std::path::PathBuf;

use rayon::prelude::*;

use hashmark_core::{ChangeRecord, ChangeStatus, DigestConfig, SourceEntry};

use crate::digester;
use crate::manifest::{ManifestEntry, RunManifest};
use crate::placer;

/// Per-status counts over a change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTally {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub unmodified: usize,
}

impl ChangeTally {
    pub fn from_records(records: &[ChangeRecord]) -> Self {
        let mut tally = Self::default();
        for record in records {
            match record.status {
                ChangeStatus::Added => tally.added += 1,
                ChangeStatus::Modified => tally.modified += 1,
                ChangeStatus::Removed => tally.removed += 1,
                ChangeStatus::Unmodified => tally.unmodified += 1,
            }
        }
        tally
    }

    /// Number of records that would make a run do work.
    pub fn pending(&self) -> usize {
        self.added + self.modified + self.removed
    }
}

/// Classify `entries` against what the previous run recorded.
///
/// Never fails: an entry that cannot be read is reported `modified` and the
/// reconciler surfaces the error against it.
pub fn detect(
    entries: &[SourceEntry],
    manifest: &RunManifest,
    config: &DigestConfig,
) -> Vec<ChangeRecord> {
    let mut current = BTreeSet::new();
    let mut records: Vec<ChangeRecord> = entries
        .par_iter()
        .map(|entry| {
            let status = if entry.is_dir() {
                dir_status(entry, manifest, config)
            } else {
                file_status(entry, manifest, config)
            };
            ChangeRecord::new(entry.relative.clone(), status)
        })
        .collect();
    for entry in entries {
        current.insert(entry.key());
    }
    records.sort_by_key(|r| hashmark_core::relative_key(&r.path));

    let mut removed: Vec<ChangeRecord> = manifest
        .artifacts
        .keys()
        .chain(manifest.directories.iter())
        .filter(|key| !current.contains(*key))
        .map(|key| ChangeRecord::new(PathBuf::from(key), ChangeStatus::Removed))
        .collect();
    removed.sort_by(|a, b| a.path.cmp(&b.path));
    removed.dedup();
    records.extend(removed);

    records
}

fn dir_status(entry: &SourceEntry, manifest: &RunManifest, config: &DigestConfig) -> ChangeStatus {
    let key = entry.key();
    if manifest.artifacts.contains_key(&key) {
        // Was a file last run.
        return ChangeStatus::Modified;
    }
    if !manifest.directories.contains(&key) {
        return ChangeStatus::Added;
    }
    match placer::mirrored_dir(&entry.relative, &config.dest) {
        Ok(dir) if dir.is_dir() => ChangeStatus::Unmodified,
        _ => ChangeStatus::Modified,
    }
}

fn file_status(entry: &SourceEntry, manifest: &RunManifest, config: &DigestConfig) -> ChangeStatus {
    let key = entry.key();
    let Some(recorded) = manifest.artifacts.get(&key) else {
        if manifest.directories.contains(&key) {
            // Was a directory last run.
            return ChangeStatus::Modified;
        }
        return ChangeStatus::Added;
    };
    if recorded.algorithm != config.algorithm || !artifacts_present(entry, recorded, config) {
        return ChangeStatus::Modified;
    }
    match digester::digest_file(entry, config.algorithm) {
        Ok(result) if result.digest == recorded.digest => ChangeStatus::Unmodified,
        Ok(_) => ChangeStatus::Modified,
        Err(e) => {
            // Leave the failure for the reconciler to report against the entry.
            tracing::debug!("cannot digest {}: {e}", entry.relative.display());
            ChangeStatus::Modified
        }
    }
}

fn artifacts_present(entry: &SourceEntry, recorded: &ManifestEntry, config: &DigestConfig) -> bool {
    match placer::artifact_paths(
        &entry.relative,
        &config.dest,
        recorded.algorithm,
        &recorded.digest,
    ) {
        Ok(paths) => paths.stamped.is_file() && paths.sidecar.is_file(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use hashmark_core::DigestAlgorithm;
    use tempfile::TempDir;

    use crate::reconciler::Reconciler;

    struct Fixture {
        src: TempDir,
        dest: TempDir,
        config: DigestConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let dest = TempDir::new().unwrap();
            let config = DigestConfig::new(dest.path(), DigestAlgorithm::Sha1);
            Self {
                src: TempDir::new().unwrap(),
                dest,
                config,
            }
        }

        fn write(&self, relative: &str, content: &str) -> SourceEntry {
            let path = self.src.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            SourceEntry::file(relative, path)
        }

        fn dir(&self, relative: &str) -> SourceEntry {
            let path = self.src.path().join(relative);
            fs::create_dir_all(&path).unwrap();
            SourceEntry::directory(relative, path)
        }

        fn sync(&self, entries: &[SourceEntry]) -> RunManifest {
            let summary = Reconciler::new(&self.config).run(entries, None).unwrap();
            let mut manifest = RunManifest::new(self.config.algorithm);
            manifest.record(&summary, self.config.algorithm);
            manifest
        }
    }

    fn status_of(records: &[ChangeRecord], path: &str) -> ChangeStatus {
        records
            .iter()
            .find(|r| r.path == Path::new(path))
            .map(|r| r.status)
            .unwrap_or_else(|| panic!("no record for {path}: {records:?}"))
    }

    #[test]
    fn everything_unmodified_right_after_sync() {
        let fx = Fixture::new();
        let entries = vec![fx.dir("js"), fx.write("js/app.js", "app")];
        let manifest = fx.sync(&entries);

        let records = detect(&entries, &manifest, &fx.config);
        assert_eq!(ChangeTally::from_records(&records).pending(), 0);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn classifies_added_modified_removed() {
        let fx = Fixture::new();
        let old = vec![fx.write("a.txt", "a"), fx.write("b.txt", "b")];
        let manifest = fx.sync(&old);

        let current = vec![fx.write("a.txt", "a2"), fx.write("c.txt", "c")];
        let records = detect(&current, &manifest, &fx.config);

        assert_eq!(status_of(&records, "a.txt"), ChangeStatus::Modified);
        assert_eq!(status_of(&records, "c.txt"), ChangeStatus::Added);
        assert_eq!(status_of(&records, "b.txt"), ChangeStatus::Removed);
        assert_eq!(records.last().unwrap().status, ChangeStatus::Removed);
        assert_eq!(
            ChangeTally::from_records(&records),
            ChangeTally {
                added: 1,
                modified: 1,
                removed: 1,
                unmodified: 0,
            }
        );
    }

    #[test]
    fn missing_stamped_copy_counts_as_modified() {
        let fx = Fixture::new();
        let entries = vec![fx.write("a.txt", "a")];
        let manifest = fx.sync(&entries);
        let recorded = manifest.artifact(Path::new("a.txt")).unwrap();
        fs::remove_file(fx.dest.path().join(format!("{}-a.txt", recorded.digest))).unwrap();

        let records = detect(&entries, &manifest, &fx.config);
        assert_eq!(status_of(&records, "a.txt"), ChangeStatus::Modified);
    }

    #[test]
    fn algorithm_switch_marks_files_modified() {
        let fx = Fixture::new();
        let entries = vec![fx.write("a.txt", "a")];
        let manifest = fx.sync(&entries);
        let sha256 = DigestConfig::new(fx.dest.path(), DigestAlgorithm::Sha256);

        let records = detect(&entries, &manifest, &sha256);
        assert_eq!(status_of(&records, "a.txt"), ChangeStatus::Modified);
    }

    #[test]
    fn removed_directory_is_reported() {
        let fx = Fixture::new();
        let manifest = fx.sync(&[fx.dir("img")]);

        let records = detect(&[], &manifest, &fx.config);
        assert_eq!(status_of(&records, "img"), ChangeStatus::Removed);
    }

    #[test]
    fn missing_mirrored_directory_counts_as_modified() {
        let fx = Fixture::new();
        let entries = vec![fx.dir("empty")];
        let manifest = fx.sync(&entries);
        fs::remove_dir(fx.dest.path().join("empty")).unwrap();

        let records = detect(&entries, &manifest, &fx.config);
        assert_eq!(status_of(&records, "empty"), ChangeStatus::Modified);
    }

    #[test]
    fn file_replaced_by_directory_is_modified() {
        let fx = Fixture::new();
        let manifest = fx.sync(&[fx.write("x", "file")]);
        fs::remove_file(fx.src.path().join("x")).unwrap();

        let current = vec![fx.dir("x"), fx.write("x/inner.txt", "inner")];
        let records = detect(&current, &manifest, &fx.config);

        assert_eq!(status_of(&records, "x"), ChangeStatus::Modified);
        assert_eq!(status_of(&records, "x/inner.txt"), ChangeStatus::Added);
        assert!(records.iter().all(|r| r.status != ChangeStatus::Removed));
    }

    #[test]
    fn directory_replaced_by_file_is_modified() {
        let fx = Fixture::new();
        let manifest = fx.sync(&[fx.dir("x"), fx.write("x/inner.txt", "inner")]);
        fs::remove_dir_all(fx.src.path().join("x")).unwrap();

        let current = vec![fx.write("x", "file")];
        let records = detect(&current, &manifest, &fx.config);

        assert_eq!(status_of(&records, "x"), ChangeStatus::Modified);
        assert_eq!(status_of(&records, "x/inner.txt"), ChangeStatus::Removed);
    }
}

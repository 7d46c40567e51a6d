//! Run manifest: what the previous run left in the destination.
//!
//! Persists a `RunManifest` JSON document at
//! `<project_root>/.hashmark/<task>.json`, outside the destination so full
//! runs stay byte-identical. Writes use the same atomic `.tmp` + rename
//! pattern as the artifacts themselves.
//!
//! The manifest records the algorithm used per artifact. Removal consults it
//! so a source deleted after an algorithm switch still has its old sidecar
//! cleaned up.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hashmark_core::{relative_key, DigestAlgorithm};

use crate::error::{io_err, EngineError};
use crate::reconciler::RunSummary;

/// Digest recorded for one placed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub algorithm: DigestAlgorithm,
    pub digest: String,
}

/// On-disk run manifest. Keys are `/`-separated relative paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub generated_at: DateTime<Utc>,
    /// Algorithm of the most recent run.
    pub algorithm: DigestAlgorithm,
    #[serde(default)]
    pub artifacts: BTreeMap<String, ManifestEntry>,
    #[serde(default)]
    pub directories: BTreeSet<String>,
}

impl RunManifest {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            generated_at: Utc::now(),
            algorithm,
            artifacts: BTreeMap::new(),
            directories: BTreeSet::new(),
        }
    }

    pub fn artifact(&self, relative: &Path) -> Option<&ManifestEntry> {
        self.artifacts.get(&relative_key(relative))
    }

    /// Fold a finished run into the manifest.
    ///
    /// A full run replaces everything. Paths whose artifacts were removed are
    /// dropped; placed artifacts and mirrored directories are (re)recorded.
    /// A path is either an artifact or a directory, so recording one kind
    /// drops any record of the other. Failed entries keep their previous record so the next run sees them
    /// as changed again.
    pub fn record(&mut self, summary: &RunSummary, algorithm: DigestAlgorithm) {
        if summary.full {
            self.artifacts.clear();
            self.directories.clear();
        }
        self.algorithm = algorithm;

        for relative in &summary.removed {
            let key = relative_key(relative);
            self.artifacts.remove(&key);
            self.directories.remove(&key);
        }
        for relative in &summary.directories {
            let key = relative_key(relative);
            self.artifacts.remove(&key);
            self.directories.insert(key);
        }
        for artifact in &summary.placed {
            let key = relative_key(&artifact.relative);
            self.directories.remove(&key);
            self.artifacts.insert(
                key,
                ManifestEntry {
                    algorithm: artifact.algorithm,
                    digest: artifact.digest.clone(),
                },
            );
        }
    }
}

/// Load the manifest at `path`.
///
/// Returns `None` if the file does not yet exist (no previous run).
pub fn load_at(path: &Path) -> Result<Option<RunManifest>, EngineError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save the manifest atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(path: &Path, manifest: &RunManifest) -> Result<(), EngineError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid manifest path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(manifest)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

//! Source walker: source root + include/exclude globs → ordered entries.
//!
//! Entries come out sorted by file name at each level, with every directory
//! ahead of its contents. Patterns match against the `/`-separated path
//! relative to the source root.
//!
//! `include` filters files only; directories are always visited so nested
//! matches are found. `exclude` applies to both, and an excluded directory
//! prunes its whole subtree.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use hashmark_core::{relative_key, SourceEntry};

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    pruned: Vec<PathBuf>,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include: None,
            exclude: None,
            pruned: Vec::new(),
        }
    }

    pub fn include(mut self, patterns: &[String]) -> Result<Self, EngineError> {
        self.include = build_globset(patterns)?;
        Ok(self)
    }

    pub fn exclude(mut self, patterns: &[String]) -> Result<Self, EngineError> {
        self.exclude = build_globset(patterns)?;
        Ok(self)
    }

    /// Never descend into `path` (absolute). Used for a destination or state
    /// directory that happens to sit under the source root.
    pub fn prune(mut self, path: impl Into<PathBuf>) -> Self {
        self.pruned.push(path.into());
        self
    }

    pub fn collect(&self) -> Result<Vec<SourceEntry>, EngineError> {
        let mut entries = Vec::new();
        let walk = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_pruned(e.path()));

        for entry in walk {
            let entry = entry.map_err(|source| EngineError::Walk {
                path: self.root.clone(),
                source,
            })?;
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let relative = relative.to_path_buf();

            if entry.file_type().is_dir() {
                entries.push(SourceEntry::directory(relative, entry.path()));
            } else if entry.path().is_file() {
                if self.included(&relative) {
                    entries.push(SourceEntry::file(relative, entry.path()));
                }
            } else {
                debug!("skipping {}: not a regular file", entry.path().display());
            }
        }

        debug!("walked {}: {} entries", self.root.display(), entries.len());
        Ok(entries)
    }

    fn is_pruned(&self, path: &Path) -> bool {
        if self.pruned.iter().any(|p| p == path) {
            return true;
        }
        match (&self.exclude, path.strip_prefix(&self.root)) {
            (Some(exclude), Ok(relative)) if relative != Path::new("") => {
                exclude.is_match(relative_key(relative))
            }
            _ => false,
        }
    }

    fn included(&self, relative: &Path) -> bool {
        match &self.include {
            Some(include) => include.is_match(relative_key(relative)),
            None => true,
        }
    }
}

/// Walk `source_root` with the given filters.
pub fn collect(
    source_root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<SourceEntry>, EngineError> {
    Walker::new(source_root)
        .include(include)?
        .exclude(exclude)?
        .collect()
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>, EngineError> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| EngineError::Glob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|source| EngineError::Glob {
        pattern: patterns.join(", "),
        source,
    })?;
    Ok(Some(set))
}

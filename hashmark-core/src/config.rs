//! Project configuration: `hashmark.yaml` at the project root.
//!
//! # Storage layout
//!
//! ```text
//! <project_root>/
//!   hashmark.yaml            (config: written by `hashmark init`)
//!   .hashmark/
//!     <task>.json            (run manifest, owned by hashmark-engine)
//! ```
//!
//! # API pattern
//!
//! Functions take the project root explicitly (`load_at(root, …)`); relative
//! `source` and `dest` values are resolved against it. Command-line values
//! arrive as [`ConfigOverrides`] and win over the file.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DigestAlgorithm, FailurePolicy};

pub const CONFIG_FILE: &str = "hashmark.yaml";
pub const STATE_DIR: &str = ".hashmark";
pub const DEFAULT_TASK: &str = "digest";

// ---------------------------------------------------------------------------
// 1. On-disk and override shapes
// ---------------------------------------------------------------------------

/// `hashmark.yaml` as written by users. Every field is optional so partial
/// files can be completed by overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,
    /// Kept as text so an unknown name surfaces as `UnsupportedAlgorithm`
    /// rather than a YAML parse error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub source: Option<PathBuf>,
    pub dest: Option<PathBuf>,
    pub algorithm: Option<String>,
    pub jobs: Option<usize>,
    pub failure_policy: Option<FailurePolicy>,
}

// ---------------------------------------------------------------------------
// 2. Resolved configuration
// ---------------------------------------------------------------------------

/// Everything a single reconciliation needs. Immutable for the run and
/// passed into every component call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestConfig {
    pub dest: PathBuf,
    pub algorithm: DigestAlgorithm,
    /// Worker count; `None` lets the pool pick.
    pub jobs: Option<usize>,
    pub failure_policy: FailurePolicy,
}

impl DigestConfig {
    pub fn new(dest: impl Into<PathBuf>, algorithm: DigestAlgorithm) -> Self {
        Self {
            dest: dest.into(),
            algorithm,
            jobs: None,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// A fully resolved project: where sources live, which of them to take, and
/// how to digest them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub project_root: PathBuf,
    pub source: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub task: String,
    pub digest: DigestConfig,
}

impl ProjectConfig {
    /// `<project_root>/.hashmark/<task>.json`: pure, no I/O.
    pub fn manifest_path(&self) -> PathBuf {
        self.project_root
            .join(STATE_DIR)
            .join(format!("{}.json", self.task))
    }
}

// ---------------------------------------------------------------------------
// 3. Load / resolve
// ---------------------------------------------------------------------------

/// `<project_root>/hashmark.yaml`: pure, no I/O.
pub fn config_path_at(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_FILE)
}

/// Read `hashmark.yaml` if present.
///
/// Returns `Ok(None)` when the file does not exist and
/// `CoreError::ConfigParse` (with path + line context) if it is malformed.
pub fn load_file_at(project_root: &Path) -> Result<Option<ConfigFile>, CoreError> {
    let path = config_path_at(project_root);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    if contents.trim().is_empty() {
        return Ok(Some(ConfigFile::default()));
    }
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|e| CoreError::ConfigParse { path, source: e })
}

/// Load and resolve the project configuration.
///
/// A missing file is tolerated only when the overrides name both `source`
/// and `dest`; otherwise `CoreError::ConfigNotFound`.
pub fn load_at(project_root: &Path, overrides: ConfigOverrides) -> Result<ProjectConfig, CoreError> {
    let file = match load_file_at(project_root)? {
        Some(file) => file,
        None if overrides.source.is_some() && overrides.dest.is_some() => ConfigFile::default(),
        None => {
            return Err(CoreError::ConfigNotFound {
                path: config_path_at(project_root),
            })
        }
    };
    resolve(project_root, file, overrides)
}

/// Merge file values with overrides and validate the result.
///
/// The algorithm is parsed here, before any source file is touched.
pub fn resolve(
    project_root: &Path,
    file: ConfigFile,
    overrides: ConfigOverrides,
) -> Result<ProjectConfig, CoreError> {
    let algorithm = match overrides.algorithm.or(file.algorithm) {
        Some(name) => name.parse::<DigestAlgorithm>()?,
        None => DigestAlgorithm::default(),
    };

    let source = overrides
        .source
        .or(file.source)
        .ok_or_else(|| invalid("`source` is required"))?;
    let dest = overrides
        .dest
        .or(file.dest)
        .ok_or_else(|| invalid("`dest` is required"))?;

    let jobs = overrides.jobs.or(file.jobs);
    if jobs == Some(0) {
        return Err(invalid("`jobs` must be at least 1"));
    }

    let task = file.task.unwrap_or_else(|| DEFAULT_TASK.to_owned());
    if task.is_empty() || task.contains(['/', '\\']) || task.starts_with('.') {
        return Err(invalid(format!("`task` must be a plain file name, got '{task}'")));
    }

    let source = resolve_path(project_root, &source);
    let dest = resolve_path(project_root, &dest);
    if source == dest {
        return Err(invalid("`source` and `dest` must differ"));
    }
    if source.starts_with(&dest) {
        return Err(invalid("`source` must not live inside `dest`"));
    }
    // A full run empties `dest`, which must not take the project or its
    // state directory with it.
    let root = normalize(project_root);
    if root.starts_with(&dest) || root.join(STATE_DIR).starts_with(&dest) {
        return Err(invalid(format!(
            "`dest` must not contain the project root, got '{}'",
            dest.display()
        )));
    }

    Ok(ProjectConfig {
        project_root: project_root.to_path_buf(),
        source,
        include: file.include,
        exclude: file.exclude,
        task,
        digest: DigestConfig {
            dest,
            algorithm,
            jobs,
            failure_policy: overrides
                .failure_policy
                .or(file.failure_policy)
                .unwrap_or_default(),
        },
    })
}

/// Resolve a path-like config value against the project root.
///
/// `.` and `..` are folded lexically so ancestor checks see the real target.
pub fn resolve_path(project_root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        normalize(value)
    } else {
        normalize(&project_root.join(value))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Write a starter `hashmark.yaml`.
///
/// Idempotent: if the file already exists it is parsed and returned unchanged.
/// Write flow: serialize → `hashmark.yaml.tmp` sibling → `rename`.
pub fn init_at(project_root: &Path, file: ConfigFile) -> Result<ConfigFile, CoreError> {
    if let Some(existing) = load_file_at(project_root)? {
        return Ok(existing);
    }
    if let Some(name) = file.algorithm.as_deref() {
        name.parse::<DigestAlgorithm>()?;
    }

    std::fs::create_dir_all(project_root)?;
    let path = config_path_at(project_root);
    let tmp = path.with_file_name(format!("{CONFIG_FILE}.tmp"));
    let yaml = serde_yaml::to_string(&file).map_err(|e| CoreError::ConfigParse {
        path: path.clone(),
        source: e,
    })?;
    std::fs::write(&tmp, yaml)?;
    std::fs::rename(&tmp, &path)?;
    Ok(file)
}

fn invalid(reason: impl Into<String>) -> CoreError {
    CoreError::InvalidConfig {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

//! Subcommands and the project options they share.

pub mod digest;
pub mod init;
pub mod status;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Args;

use hashmark_core::{config, ConfigOverrides, FailurePolicy, ProjectConfig};

/// Absolute project root, so paths in output and config resolve the same
/// way regardless of how `-C` was spelled.
pub fn project_root(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    Ok(cwd.join(dir))
}

/// Overrides for values in hashmark.yaml.
#[derive(Args, Debug, Default)]
pub struct ProjectArgs {
    /// Source root (relative to the project root).
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Destination root (relative to the project root).
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Digest algorithm: MD5 | SHA1 | SHA256 | SHA512.
    #[arg(long, short = 'a')]
    pub algorithm: Option<String>,

    /// Worker threads.
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// What to do after a file fails: continue | abort.
    #[arg(long = "on-error", value_name = "POLICY")]
    pub on_error: Option<FailurePolicyArg>,
}

impl ProjectArgs {
    pub fn load(self, project_root: &Path) -> Result<ProjectConfig> {
        let overrides = ConfigOverrides {
            source: self.source,
            dest: self.dest,
            algorithm: self.algorithm,
            jobs: self.jobs,
            failure_policy: self.on_error.map(Into::into),
        };
        let project = config::load_at(project_root, overrides).with_context(|| {
            format!(
                "failed to load configuration from '{}'",
                project_root.display()
            )
        })?;
        tracing::debug!(
            "project {}: source {}, dest {}, algorithm {}",
            project.project_root.display(),
            project.source.display(),
            project.digest.dest.display(),
            project.digest.algorithm
        );
        Ok(project)
    }
}

/// Thin wrapper so clap can parse `FailurePolicy` from CLI args.
#[derive(Debug, Clone, Copy)]
pub struct FailurePolicyArg(pub FailurePolicy);

impl FromStr for FailurePolicyArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continue" => Ok(Self(FailurePolicy::Continue)),
            "abort" => Ok(Self(FailurePolicy::Abort)),
            other => Err(format!(
                "unknown failure policy '{other}'; expected: continue, abort"
            )),
        }
    }
}

impl fmt::Display for FailurePolicyArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            FailurePolicy::Continue => f.write_str("continue"),
            FailurePolicy::Abort => f.write_str("abort"),
        }
    }
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(p: FailurePolicyArg) -> Self {
        p.0
    }
}

//! `hashmark init --source <dir> --dest <dir> [--algorithm ...]`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use hashmark_core::{config, ConfigFile};

/// Write a starter hashmark.yaml.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Source root, relative to the project root.
    #[arg(long)]
    pub source: PathBuf,

    /// Destination root, relative to the project root.
    #[arg(long)]
    pub dest: PathBuf,

    /// Digest algorithm: MD5 | SHA1 | SHA256 | SHA512 (default MD5).
    #[arg(long, short = 'a')]
    pub algorithm: Option<String>,

    /// Glob of files to include (repeatable).
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Glob of files or directories to exclude (repeatable).
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,
}

impl InitArgs {
    pub fn run(self, project_root: &Path) -> Result<()> {
        let path = config::config_path_at(project_root);
        let existed = path.exists();
        let file = ConfigFile {
            source: Some(self.source),
            dest: Some(self.dest),
            algorithm: self.algorithm,
            include: self.include,
            exclude: self.exclude,
            ..ConfigFile::default()
        };

        let written = config::init_at(project_root, file)
            .with_context(|| format!("failed to init '{}'", project_root.display()))?;

        if existed {
            println!("✓ {} already exists, left unchanged", path.display());
        } else {
            println!("✓ Wrote {}", path.display());
        }
        if let (Some(source), Some(dest)) = (&written.source, &written.dest) {
            println!(
                "  {} → {} ({})",
                source.display(),
                dest.display(),
                written.algorithm.as_deref().unwrap_or("MD5")
            );
        }
        Ok(())
    }
}

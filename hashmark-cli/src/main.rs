//! hashmark: content-addressed copies of a source tree.
//!
//! # Usage
//!
//! ```text
//! hashmark init --source <dir> --dest <dir> [--algorithm MD5|SHA1|SHA256|SHA512]
//! hashmark digest [--full] [--changes <file.json>] [--json]
//! hashmark status [--all] [--json]
//! ```
//!
//! Every command accepts `-C <dir>` to pick the project root and `-v`/`-vv`
//! for more log output on stderr.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{digest::DigestArgs, init::InitArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hashmark",
    version,
    about = "Copy a source tree under content-digest file names, with digest sidecars",
    long_about = None,
)]
struct Cli {
    /// Project root holding hashmark.yaml.
    #[arg(short = 'C', long = "project-dir", global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Raise log verbosity (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter hashmark.yaml in the project root.
    Init(InitArgs),

    /// Bring the destination up to date with the sources.
    Digest(DigestArgs),

    /// Show what the next digest run would change.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = commands::project_root(&cli.project_dir)?;
    match cli.command {
        Commands::Init(args) => args.run(&project_root),
        Commands::Digest(args) => args.run(&project_root),
        Commands::Status(args) => args.run(&project_root),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

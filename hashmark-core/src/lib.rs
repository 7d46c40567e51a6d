//! hashmark core library: domain types, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: algorithm enum, source entries, change records, artifacts
//! - [`error`]: [`CoreError`]
//! - [`config`]: `hashmark.yaml` load / resolve / init

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigFile, ConfigOverrides, DigestConfig, ProjectConfig};
pub use error::CoreError;
pub use types::{
    relative_key, ChangeRecord, ChangeStatus, DerivedArtifact, DigestAlgorithm, DigestResult,
    EntryKind, FailurePolicy, SourceEntry,
};

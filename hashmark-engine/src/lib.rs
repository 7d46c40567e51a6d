//! # hashmark-engine
//!
//! Digesting, artifact placement, and incremental reconciliation.
//!
//! Call [`pipeline::run`] to bring a project's destination up to date, or
//! [`pipeline::status`] to see what the next run would do. The pieces are
//! usable on their own:
//!
//! - [`digester`]: bytes + algorithm → digest
//! - [`placer`]: stamped copy + sidecar naming, placement, removal
//! - [`reconciler`]: full / incremental runs over a source set
//! - [`walker`], [`changes`], [`manifest`]: source discovery and run state

pub mod changes;
pub mod digester;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod placer;
pub mod reconciler;
pub mod walker;

pub use changes::{detect, ChangeTally};
pub use digester::{digest, digest_file, digest_named, DigestValue};
pub use error::EngineError;
pub use manifest::{ManifestEntry, RunManifest};
pub use pipeline::{
    load_changes, FullReason, PipelineOptions, PipelineResult, RunMode, StatusReport,
};
pub use placer::ArtifactPaths;
pub use reconciler::{CancelToken, EntryFailure, Reconciler, RunSummary};
pub use walker::Walker;

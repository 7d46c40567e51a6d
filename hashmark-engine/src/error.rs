//! Error types for hashmark-engine.

use std::path::PathBuf;

use thiserror::Error;

use hashmark_core::CoreError;

/// All errors that can arise from digesting, placing, and reconciling.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration or domain parsing error (including unsupported algorithms).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A change record names a path the current source set does not contain.
    #[error("no source entry for {path}")]
    MissingSource { path: PathBuf },

    /// Directory traversal failure.
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// An include/exclude pattern did not compile.
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// JSON serialization/deserialization error (run manifest, change sets).
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Convenience constructor for [`EngineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}

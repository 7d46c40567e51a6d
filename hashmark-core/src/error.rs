//! Error types for hashmark-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from configuration and domain parsing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The configured algorithm name is not one of the supported digests.
    #[error("unsupported digest algorithm '{name}'; expected one of: MD5, SHA1, SHA256, SHA512")]
    UnsupportedAlgorithm { name: String },

    /// Underlying I/O failure while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No `hashmark.yaml` at the project root and no overrides to stand in for it.
    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config parsed but a value is out of range or missing.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
}

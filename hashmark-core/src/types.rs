//! Domain types for hashmark.
//!
//! Relative paths are the structure-preserving key that ties a source file to
//! the artifacts it owns. They are stored as `PathBuf` and rendered as
//! `/`-separated keys via [`relative_key`] wherever they are persisted.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Digest algorithm
// ---------------------------------------------------------------------------

/// The digest used to stamp file names. Exactly one is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 4] = [
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha512,
    ];

    /// Canonical upper-case name, as accepted in configuration.
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA1",
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Sidecar file extension. These literals must never change: removal
    /// rebuilds sidecar paths from them.
    pub fn suffix(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of the raw digest in bytes.
    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Md5 => 16,
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Length of the lowercase hex rendering.
    pub fn hex_len(self) -> usize {
        self.output_len() * 2
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(CoreError::UnsupportedAlgorithm {
                name: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for DigestAlgorithm {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DigestAlgorithm> for String {
    fn from(a: DigestAlgorithm) -> Self {
        a.name().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Source entries
// ---------------------------------------------------------------------------

/// Whether a source entry is content (digested) or structure (mirrored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One input handed to the engine by a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceEntry {
    /// Path relative to the source root; preserved under the destination.
    pub relative: PathBuf,
    /// Resolvable location of the source on disk.
    pub location: PathBuf,
    pub kind: EntryKind,
}

impl SourceEntry {
    pub fn file(relative: impl Into<PathBuf>, location: impl Into<PathBuf>) -> Self {
        Self {
            relative: relative.into(),
            location: location.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(relative: impl Into<PathBuf>, location: impl Into<PathBuf>) -> Self {
        Self {
            relative: relative.into(),
            location: location.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn key(&self) -> String {
        relative_key(&self.relative)
    }
}

/// Render a relative path as a `/`-separated key, dropping `.` components.
pub fn relative_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Change classification
// ---------------------------------------------------------------------------

/// How a path changed since the previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Removed,
    Unmodified,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeStatus::Added => write!(f, "added"),
            ChangeStatus::Modified => write!(f, "modified"),
            ChangeStatus::Removed => write!(f, "removed"),
            ChangeStatus::Unmodified => write!(f, "unmodified"),
        }
    }
}

/// A `(path, status)` pair from a change tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: PathBuf,
    pub status: ChangeStatus,
}

impl ChangeRecord {
    pub fn new(path: impl Into<PathBuf>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Digest of one source file, in hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResult {
    pub relative: PathBuf,
    pub digest: String,
}

/// The materialized outputs owned by one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedArtifact {
    pub relative: PathBuf,
    pub algorithm: DigestAlgorithm,
    pub digest: String,
    /// `<dest>/<dir>/<digest>-<name>`
    pub stamped: PathBuf,
    /// `<dest>/<dir>/<name>.<suffix>`
    pub sidecar: PathBuf,
}

/// What to do with the rest of a run once one entry fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep going and report every failure at the end.
    #[default]
    Continue,
    /// Stop scheduling new work after the first failure.
    Abort,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_lowercase_name() {
        assert_eq!(DigestAlgorithm::Md5.suffix(), "md5");
        assert_eq!(DigestAlgorithm::Sha1.suffix(), "sha1");
        assert_eq!(DigestAlgorithm::Sha256.suffix(), "sha256");
        assert_eq!(DigestAlgorithm::Sha512.suffix(), "sha512");
    }

    #[test]
    fn default_algorithm_is_md5() {
        assert_eq!(DigestAlgorithm::default(), DigestAlgorithm::Md5);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            "sha256".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha256
        );
        assert_eq!(
            "SHA1".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha1
        );
    }

    #[test]
    fn parse_unknown_is_unsupported() {
        let err = "CRC32".parse::<DigestAlgorithm>().unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedAlgorithm { ref name } if name == "CRC32"));
        assert!(err.to_string().contains("CRC32"));
    }

    #[test]
    fn algorithm_serde_uses_canonical_name() {
        let yaml = serde_yaml::to_string(&DigestAlgorithm::Sha512).expect("serialize");
        assert_eq!(yaml.trim(), "SHA512");
        let back: DigestAlgorithm = serde_yaml::from_str("sha512").expect("deserialize");
        assert_eq!(back, DigestAlgorithm::Sha512);
        assert!(serde_yaml::from_str::<DigestAlgorithm>("whirlpool").is_err());
    }

    #[test]
    fn hex_len_matches_output_len() {
        for algorithm in DigestAlgorithm::ALL {
            assert_eq!(algorithm.hex_len(), algorithm.output_len() * 2);
        }
        assert_eq!(DigestAlgorithm::Sha256.hex_len(), 64);
    }

    #[test]
    fn relative_key_uses_forward_slashes() {
        let path = Path::new(".").join("css").join("site.css");
        assert_eq!(relative_key(&path), "css/site.css");
        assert_eq!(relative_key(Path::new("notes.txt")), "notes.txt");
    }

    #[test]
    fn change_status_serializes_lowercase() {
        let record = ChangeRecord::new("a.txt", ChangeStatus::Modified);
        let yaml = serde_yaml::to_string(&record).expect("serialize");
        assert!(yaml.contains("status: modified"));
        assert_eq!(ChangeStatus::Unmodified.to_string(), "unmodified");
    }
}

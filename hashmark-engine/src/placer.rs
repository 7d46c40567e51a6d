//! Artifact placement: stamped copy + sidecar under the destination root.
//!
//! ## Naming convention
//!
//! For a source at relative path `dir/name`:
//!
//! ```text
//! <dest>/dir/<hex>-name        copy of the source bytes
//! <dest>/dir/name.<suffix>     sidecar holding <hex>, no trailing newline
//! ```
//!
//! No index of artifacts is needed to find them again: the sidecar path is
//! rebuilt from `(relative path, algorithm)` and its content names the
//! stamped copy. Removal relies on exactly that.
//!
//! Every write goes to `<path>.hashmark.tmp` first and is then renamed into
//! place, so a sidecar is never half-written.

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use hashmark_core::{DerivedArtifact, DigestAlgorithm, SourceEntry};

use crate::error::{io_err, EngineError};

/// Destination paths owned by one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub stamped: PathBuf,
    pub sidecar: PathBuf,
}

// ---------------------------------------------------------------------------
// Path computation (pure)
// ---------------------------------------------------------------------------

/// Stamped copy and sidecar paths for `relative` under `dest_root`.
pub fn artifact_paths(
    relative: &Path,
    dest_root: &Path,
    algorithm: DigestAlgorithm,
    digest_hex: &str,
) -> Result<ArtifactPaths, EngineError> {
    let (parent, name) = split_relative(relative, dest_root)?;
    Ok(ArtifactPaths {
        stamped: parent.join(stamped_name(name, digest_hex)),
        sidecar: parent.join(sidecar_name(name, algorithm)),
    })
}

/// `<dest>/dir/name.<suffix>` for `relative = dir/name`.
pub fn sidecar_path(
    relative: &Path,
    dest_root: &Path,
    algorithm: DigestAlgorithm,
) -> Result<PathBuf, EngineError> {
    let (parent, name) = split_relative(relative, dest_root)?;
    Ok(parent.join(sidecar_name(name, algorithm)))
}

/// `<dest>/dir` for a directory entry at `relative = dir`.
pub fn mirrored_dir(relative: &Path, dest_root: &Path) -> Result<PathBuf, EngineError> {
    Ok(dest_root.join(clean_relative(relative, dest_root)?))
}

fn stamped_name(name: &OsStr, digest_hex: &str) -> OsString {
    let mut stamped = OsString::from(format!("{digest_hex}-"));
    stamped.push(name);
    stamped
}

fn sidecar_name(name: &OsStr, algorithm: DigestAlgorithm) -> OsString {
    let mut sidecar = name.to_os_string();
    sidecar.push(".");
    sidecar.push(algorithm.suffix());
    sidecar
}

/// Split `relative` into `(<dest>/dir, name)`.
fn split_relative<'a>(relative: &'a Path, dest_root: &Path) -> Result<(PathBuf, &'a OsStr), EngineError> {
    let clean = clean_relative(relative, dest_root)?;
    let Some(name) = relative.file_name() else {
        return Err(io_err(
            relative,
            std::io::Error::new(ErrorKind::InvalidInput, "relative path has no file name"),
        ));
    };
    let parent = clean
        .parent()
        .map(|p| dest_root.join(p))
        .unwrap_or_else(|| dest_root.to_path_buf());
    Ok((parent, name))
}

/// Keep only normal components; reject anything that could climb out of
/// the destination root.
fn clean_relative(relative: &Path, dest_root: &Path) -> Result<PathBuf, EngineError> {
    let mut clean = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(io_err(
                    dest_root.join(relative),
                    std::io::Error::new(
                        ErrorKind::InvalidInput,
                        "relative path must stay inside the destination root",
                    ),
                ))
            }
        }
    }
    Ok(clean)
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Write the stamped copy of `content` and its sidecar.
///
/// `content` is the exact buffer that was digested, so the stamp and the
/// copied bytes can never disagree. Parent directories are created if
/// absent; an existing sidecar is overwritten.
pub fn place(
    entry: &SourceEntry,
    content: &[u8],
    digest_hex: &str,
    dest_root: &Path,
    algorithm: DigestAlgorithm,
) -> Result<DerivedArtifact, EngineError> {
    let paths = artifact_paths(&entry.relative, dest_root, algorithm, digest_hex)?;
    if let Some(parent) = paths.stamped.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    atomic_write(&paths.stamped, content)?;
    atomic_write(&paths.sidecar, digest_hex.as_bytes())?;

    tracing::debug!("placed: {}", paths.stamped.display());
    Ok(DerivedArtifact {
        relative: entry.relative.clone(),
        algorithm,
        digest: digest_hex.to_owned(),
        stamped: paths.stamped,
        sidecar: paths.sidecar,
    })
}

/// Mirror a directory entry at the destination. Idempotent; no digest, no
/// sidecar, never renamed.
pub fn mirror_dir(entry: &SourceEntry, dest_root: &Path) -> Result<PathBuf, EngineError> {
    let dir = mirrored_dir(&entry.relative, dest_root)?;
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    Ok(dir)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), EngineError> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".hashmark.tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Delete the stamped copy and sidecar owned by `relative`.
///
/// The sidecar is located by naming convention and its content names the
/// stamped copy. `known_digest` (from the run manifest) is also tried, which
/// covers a sidecar that was lost or rewritten. Missing files are not an
/// error. Returns the paths actually deleted.
pub fn remove(
    relative: &Path,
    dest_root: &Path,
    algorithm: DigestAlgorithm,
    known_digest: Option<&str>,
) -> Result<Vec<PathBuf>, EngineError> {
    let sidecar = sidecar_path(relative, dest_root, algorithm)?;
    let recorded = read_sidecar(&sidecar, algorithm)?;

    let mut digests: Vec<&str> = Vec::new();
    if let Some(d) = recorded.as_deref() {
        digests.push(d);
    }
    if let Some(d) = known_digest.filter(|d| is_digest_hex(d, algorithm)) {
        if !digests.contains(&d) {
            digests.push(d);
        }
    }
    if digests.is_empty() {
        tracing::warn!(
            "no digest known for {}; stamped copy cannot be located",
            relative.display()
        );
    }

    let mut deleted = Vec::new();
    for digest_hex in digests {
        let paths = artifact_paths(relative, dest_root, algorithm, digest_hex)?;
        if remove_file_if_exists(&paths.stamped)? {
            deleted.push(paths.stamped);
        }
    }
    if remove_file_if_exists(&sidecar)? {
        deleted.push(sidecar);
    }
    Ok(deleted)
}

/// Remove a mirrored directory if nothing is left inside it.
pub fn remove_dir_if_empty(relative: &Path, dest_root: &Path) -> Result<Option<PathBuf>, EngineError> {
    let dir = mirrored_dir(relative, dest_root)?;
    let mut entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(&dir, e)),
    };
    if entries.next().is_some() {
        tracing::debug!("keeping non-empty directory: {}", dir.display());
        return Ok(None);
    }
    std::fs::remove_dir(&dir).map_err(|e| io_err(&dir, e))?;
    Ok(Some(dir))
}

/// Read the digest stored in a sidecar, ignoring surrounding whitespace.
///
/// Returns `None` when the sidecar is absent or does not hold a well-formed
/// digest for `algorithm`.
pub fn read_sidecar(path: &Path, algorithm: DigestAlgorithm) -> Result<Option<String>, EngineError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == ErrorKind::InvalidData => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    let digest = content.trim();
    if is_digest_hex(digest, algorithm) {
        Ok(Some(digest.to_owned()))
    } else {
        tracing::warn!("ignoring malformed sidecar: {}", path.display());
        Ok(None)
    }
}

fn is_digest_hex(value: &str, algorithm: DigestAlgorithm) -> bool {
    value.len() == algorithm.hex_len()
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn remove_file_if_exists(path: &Path) -> Result<bool, EngineError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_err(path, e)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

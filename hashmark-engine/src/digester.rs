//! Digester: file bytes + algorithm → digest value.
//!
//! Files are read whole into memory; there is no streaming pipeline. The hex
//! rendering is always lowercase and is the single representation used for
//! both the file-name stamp and the sidecar content.

use std::fmt;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use hashmark_core::{CoreError, DigestAlgorithm, DigestResult, SourceEntry};

use crate::error::{io_err, EngineError};

/// Raw digest bytes tagged with the algorithm that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DigestValue {
    algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
}

impl DigestValue {
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for DigestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Digest `content` with `algorithm`. Pure.
pub fn digest(content: &[u8], algorithm: DigestAlgorithm) -> DigestValue {
    let bytes = match algorithm {
        DigestAlgorithm::Md5 => compute::<Md5>(content),
        DigestAlgorithm::Sha1 => compute::<Sha1>(content),
        DigestAlgorithm::Sha256 => compute::<Sha256>(content),
        DigestAlgorithm::Sha512 => compute::<Sha512>(content),
    };
    DigestValue { algorithm, bytes }
}

/// Digest with an algorithm named by user input.
///
/// Fails with `UnsupportedAlgorithm` for anything outside MD5/SHA1/SHA256/SHA512.
pub fn digest_named(content: &[u8], algorithm: &str) -> Result<DigestValue, CoreError> {
    Ok(digest(content, algorithm.parse()?))
}

/// Read a source file fully and digest it.
pub fn digest_file(
    entry: &SourceEntry,
    algorithm: DigestAlgorithm,
) -> Result<DigestResult, EngineError> {
    let content = std::fs::read(&entry.location).map_err(|e| io_err(&entry.location, e))?;
    Ok(DigestResult {
        relative: entry.relative.clone(),
        digest: digest(&content, algorithm).to_hex(),
    })
}

fn compute<D: Digest>(content: &[u8]) -> Vec<u8> {
    D::digest(content).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case(DigestAlgorithm::Md5, b"hello".as_slice(), "5d41402abc4b2a76b9719d911017c592")]
    #[case(DigestAlgorithm::Md5, b"".as_slice(), "d41d8cd98f00b204e9800998ecf8427e")]
    #[case(DigestAlgorithm::Sha1, b"a".as_slice(), "86f7e437faa5a7fce15d1ddcb9eaeaea377667b8")]
    #[case(DigestAlgorithm::Sha1, b"hello".as_slice(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")]
    #[case(
        DigestAlgorithm::Sha256,
        b"hello".as_slice(),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    )]
    #[case(
        DigestAlgorithm::Sha512,
        b"".as_slice(),
        "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
         47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
    )]
    fn known_vectors(#[case] algorithm: DigestAlgorithm, #[case] input: &[u8], #[case] hex: &str) {
        assert_eq!(digest(input, algorithm).to_hex(), hex);
    }

    #[test]
    fn digest_is_deterministic_and_lowercase() {
        for algorithm in DigestAlgorithm::ALL {
            let a = digest(b"same bytes", algorithm);
            let b = digest(b"same bytes", algorithm);
            assert_eq!(a, b);
            let hex = a.to_hex();
            assert_eq!(hex.len(), algorithm.hex_len());
            assert_eq!(hex, hex.to_ascii_lowercase());
            assert_eq!(a.as_bytes().len(), algorithm.output_len());
        }
    }

    #[test]
    fn different_content_different_digest() {
        for algorithm in DigestAlgorithm::ALL {
            assert_ne!(digest(b"x", algorithm), digest(b"y", algorithm));
        }
    }

    #[test]
    fn digest_named_rejects_unknown_algorithm() {
        let err = digest_named(b"x", "ripemd160").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedAlgorithm { .. }));
        assert_eq!(
            digest_named(b"a", "sha1").expect("sha1").to_hex(),
            "86f7e437faa5a7fce15d1ddcb9eaeaea377667b8"
        );
    }

    #[test]
    fn digest_file_reads_whole_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let entry = SourceEntry::file("notes.txt", &path);

        let result = digest_file(&entry, DigestAlgorithm::Sha256).unwrap();
        assert_eq!(result.relative, std::path::PathBuf::from("notes.txt"));
        assert_eq!(
            result.digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn digest_file_missing_is_io_error_with_path() {
        let tmp = TempDir::new().unwrap();
        let entry = SourceEntry::file("gone.txt", tmp.path().join("gone.txt"));
        let err = digest_file(&entry, DigestAlgorithm::Md5).unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
        assert!(err.to_string().contains("gone.txt"));
    }
}

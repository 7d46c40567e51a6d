//! Config file error-message, resolution, and init integration tests.

use std::fs;
use std::path::PathBuf;

use assert_fs::prelude::*;
use hashmark_core::{
    config::{self, ConfigFile, ConfigOverrides},
    CoreError, DigestAlgorithm, FailurePolicy,
};
use predicates::prelude::predicate;
use rstest::rstest;

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("hashmark.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = config::load_at(root.path(), ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, CoreError::ConfigParse { .. }), "got: {err}");
    assert!(err.to_string().contains("hashmark.yaml"));
}

#[test]
fn unknown_field_is_a_parse_error() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("hashmark.yaml")
        .write_str("source: a\ndest: b\nalgorythm: MD5\n")
        .expect("write");

    let err = config::load_at(root.path(), ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, CoreError::ConfigParse { .. }), "got: {err}");
}

#[test]
fn unsupported_algorithm_in_file_is_reported_by_name() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("hashmark.yaml")
        .write_str("source: assets\ndest: build\nalgorithm: BLAKE2\n")
        .expect("write");

    let err = config::load_at(root.path(), ConfigOverrides::default()).unwrap_err();
    match err {
        CoreError::UnsupportedAlgorithm { name } => assert_eq!(name, "BLAKE2"),
        other => panic!("expected unsupported algorithm, got {other:?}"),
    }
}

#[test]
fn missing_dest_is_invalid() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("hashmark.yaml").write_str("source: assets\n").expect("write");

    let err = config::load_at(root.path(), ConfigOverrides::default()).unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfig { .. }), "got: {err}");
    assert!(err.to_string().contains("dest"));
}

// ---------------------------------------------------------------------------
// 2. Resolution
// ---------------------------------------------------------------------------

#[rstest]
#[case("MD5", DigestAlgorithm::Md5)]
#[case("SHA1", DigestAlgorithm::Sha1)]
#[case("sha256", DigestAlgorithm::Sha256)]
#[case("Sha512", DigestAlgorithm::Sha512)]
fn algorithm_names_resolve(#[case] name: &str, #[case] expected: DigestAlgorithm) {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("hashmark.yaml")
        .write_str(&format!("source: js\ndest: build\nalgorithm: {name}\n"))
        .expect("write");

    let cfg = config::load_at(root.path(), ConfigOverrides::default()).expect("load");
    assert_eq!(cfg.digest.algorithm, expected);
}

#[test]
fn full_file_resolves_every_field() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("hashmark.yaml")
        .write_str(
            "source: assets\n\
             dest: build/digest\n\
             algorithm: SHA256\n\
             include: ['**/*.js']\n\
             exclude: ['**/*.map']\n\
             jobs: 3\n\
             failure_policy: abort\n\
             task: assets\n",
        )
        .expect("write");

    let cfg = config::load_at(root.path(), ConfigOverrides::default()).expect("load");
    assert_eq!(cfg.source, root.path().join("assets"));
    assert_eq!(cfg.digest.dest, root.path().join("build/digest"));
    assert_eq!(cfg.include, vec!["**/*.js".to_string()]);
    assert_eq!(cfg.exclude, vec!["**/*.map".to_string()]);
    assert_eq!(cfg.digest.jobs, Some(3));
    assert_eq!(cfg.digest.failure_policy, FailurePolicy::Abort);
    assert_eq!(cfg.manifest_path(), root.path().join(".hashmark/assets.json"));
}

#[test]
fn overrides_stand_in_for_missing_file() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let overrides = ConfigOverrides {
        source: Some(PathBuf::from("src")),
        dest: Some(PathBuf::from("out")),
        ..ConfigOverrides::default()
    };
    let cfg = config::load_at(root.path(), overrides).expect("load");
    assert_eq!(cfg.digest.algorithm, DigestAlgorithm::Md5);
    assert_eq!(cfg.digest.dest, root.path().join("out"));
}

// ---------------------------------------------------------------------------
// 3. Init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_loadable_yaml() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let file = ConfigFile {
        source: Some(PathBuf::from("js")),
        dest: Some(PathBuf::from("build")),
        algorithm: Some("SHA1".into()),
        ..ConfigFile::default()
    };
    config::init_at(root.path(), file).expect("init");

    root.child("hashmark.yaml").assert(predicate::path::exists());
    root.child("hashmark.yaml")
        .assert(predicate::str::contains("algorithm: SHA1"));

    let cfg = config::load_at(root.path(), ConfigOverrides::default()).expect("load");
    assert_eq!(cfg.digest.algorithm, DigestAlgorithm::Sha1);
}

#[test]
fn init_rejects_unsupported_algorithm_before_writing() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let file = ConfigFile {
        source: Some(PathBuf::from("js")),
        dest: Some(PathBuf::from("build")),
        algorithm: Some("CRC32".into()),
        ..ConfigFile::default()
    };
    let err = config::init_at(root.path(), file).unwrap_err();
    assert!(matches!(err, CoreError::UnsupportedAlgorithm { .. }));
    assert!(fs::metadata(root.path().join("hashmark.yaml")).is_err());
}

//! Configuration loading and environment overrides.

use serial_test::serial;
use std::path::PathBuf;
use tollgate::config::{Config, STORAGE_DIR_ENV};

use crate::common::TestContext;

#[test]
fn test_load_from_file() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "tollgate.toml",
        r#"
        working_dir = "/srv/project"

        [files]
        allow_overwrite = true
        "#,
    );

    let config = Config::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.working_dir(), PathBuf::from("/srv/project"));
    assert!(config.files.allow_overwrite);
    assert!(config.files.auto_resolve_paths);
}

#[test]
fn test_unknown_type_is_error() {
    let err = Config::from_toml_str("[files]\nallow_overwrite = \"yes\"").unwrap_err();
    assert!(err.to_string().contains("TOML"));
}

#[test]
#[serial]
fn test_env_overrides_storage_dir() {
    let ctx = TestContext::new();
    let dir = ctx.path().join("from-env");
    std::env::set_var(STORAGE_DIR_ENV, &dir);

    let config = Config::from_toml_str("storage_dir = \"/from/file\"")
        .unwrap()
        .with_env_overrides();

    std::env::remove_var(STORAGE_DIR_ENV);
    assert_eq!(config.storage_dir(), dir);
}

#[test]
#[serial]
fn test_empty_env_value_is_ignored() {
    std::env::set_var(STORAGE_DIR_ENV, "");
    let config = Config::from_toml_str("storage_dir = \"/from/file\"")
        .unwrap()
        .with_env_overrides();
    std::env::remove_var(STORAGE_DIR_ENV);
    assert_eq!(config.storage_dir(), PathBuf::from("/from/file"));
}

//! Config loading tests

use repack_common::config::{
    load_toml_config, read_toml_config, resolve_root_folder, write_toml_config, LoggingConfig,
    TomlConfig,
};
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

const ROOT_ENV: &str = "REPACK_TEST_ROOT_FOLDER";

#[test]
fn test_write_then_read_preserves_fields() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/comics")),
        logging: LoggingConfig {
            level: Some("repack_scan=debug".to_string()),
        },
        port: Some(6000),
        cancel_timeout_secs: Some(5),
        archive_extensions: Some(vec!["cbr".to_string(), "cb7".to_string()]),
        ..TomlConfig::default()
    };

    write_toml_config(&config, &path).unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists(), "temp file renamed away");

    let loaded = read_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = 7001\n").unwrap();

    let loaded = load_toml_config(Some(&path)).unwrap();
    assert_eq!(loaded.port, Some(7001));
    assert!(loaded.root_folder.is_none());
    assert!(loaded.logging.level.is_none());
    assert!(loaded.conversion_workers.is_none());
}

#[test]
fn test_explicit_malformed_file_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"\n").unwrap();

    assert!(load_toml_config(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_root_folder_priority_cli_over_env_over_toml() {
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from-toml")),
        ..TomlConfig::default()
    };

    std::env::set_var(ROOT_ENV, "/from-env");
    assert_eq!(
        resolve_root_folder(Some("/from-cli"), ROOT_ENV, &toml),
        Some(PathBuf::from("/from-cli"))
    );
    assert_eq!(
        resolve_root_folder(None, ROOT_ENV, &toml),
        Some(PathBuf::from("/from-env"))
    );

    std::env::remove_var(ROOT_ENV);
    assert_eq!(
        resolve_root_folder(None, ROOT_ENV, &toml),
        Some(PathBuf::from("/from-toml"))
    );
    assert_eq!(
        resolve_root_folder(None, ROOT_ENV, &TomlConfig::default()),
        None
    );
}

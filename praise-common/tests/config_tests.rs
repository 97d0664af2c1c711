//! Tests for configuration loading and root folder resolution
//!
//! Tests that manipulate PRAISE_ROOT_FOLDER are marked with #[serial]
//! so they run sequentially, not in parallel.

use praise_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new(TomlConfig::default());
    let root_folder = resolver.resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_cli_arg_takes_precedence_over_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/praise-env");

    let resolver = RootFolderResolver::new(TomlConfig::default())
        .with_cli_arg(Some(PathBuf::from("/tmp/praise-cli")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/praise-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_takes_precedence_over_config_file() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/praise-env");

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/praise-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(RootFolderResolver::new(config).resolve(), PathBuf::from("/tmp/praise-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_config_file_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/praise-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(RootFolderResolver::new(config).resolve(), PathBuf::from("/tmp/praise-toml"));
}

#[test]
fn test_load_toml_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "root_folder = \"/srv/praise\"\nbind_address = \"0.0.0.0:8080\"\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/praise")));
    assert_eq!(config.bind_address(), "0.0.0.0:8080");
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_toml_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = [unterminated").unwrap();

    assert!(TomlConfig::load(&path).is_err());

    let config = TomlConfig::load_or_default(Some(&path));
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.bind_address(), "127.0.0.1:5730");
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = TomlConfig::load_or_default(Some(&dir.path().join("absent.toml")));
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join("praise.db"));
    assert!(!initializer.database_exists());
}

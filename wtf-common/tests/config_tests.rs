//! Tests for configuration resolution
//!
//! Tests that manipulate WTF_DIAL_CONFIG or WTF_DIAL_DATABASE are marked
//! with #[serial] so they never run in parallel.

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wtf_common::config::{ConfigSource, TomlConfig, CONFIG_ENV_VAR, DATABASE_ENV_VAR};
use wtf_common::Error;

#[test]
#[serial]
fn test_env_database_path_beats_config_file() {
    env::set_var(DATABASE_ENV_VAR, "/from/env.db");

    let config = TomlConfig {
        database_path: Some(PathBuf::from("/from/config.db")),
        ..TomlConfig::default()
    };
    let resolved = config.resolve_database_path(None);

    env::remove_var(DATABASE_ENV_VAR);
    assert_eq!(resolved, PathBuf::from("/from/env.db"));
}

#[test]
#[serial]
fn test_config_file_database_path_used_without_env() {
    env::remove_var(DATABASE_ENV_VAR);

    let config = TomlConfig {
        database_path: Some(PathBuf::from("/from/config.db")),
        ..TomlConfig::default()
    };
    assert_eq!(config.resolve_database_path(None), PathBuf::from("/from/config.db"));
}

#[test]
#[serial]
fn test_config_file_from_env_var() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "max_connections = 3\nmax_membership_value = 10\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let config = TomlConfig::load_or_default(None);
    env::remove_var(CONFIG_ENV_VAR);

    let config = config.expect("config should load");
    assert_eq!(config.max_connections, 3);
    assert_eq!(config.max_membership_value, 10);
}

#[test]
#[serial]
fn test_explicit_missing_config_is_error() {
    env::remove_var(CONFIG_ENV_VAR);

    let result = TomlConfig::load_or_default(Some(Path::new("/nonexistent/wtf-dial.toml")));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
#[serial]
fn test_cli_config_beats_env_var() {
    let dir = TempDir::new().unwrap();
    let cli_path = dir.path().join("cli.toml");
    let env_path = dir.path().join("env.toml");
    std::fs::write(&cli_path, "busy_timeout_ms = 111\n").unwrap();
    std::fs::write(&env_path, "busy_timeout_ms = 222\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let config = TomlConfig::load_or_default(Some(&cli_path));
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().busy_timeout_ms, 111);
}

#[test]
#[serial]
fn test_load_resolved_reports_file_source() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    let (config, source) = TomlConfig::load_resolved(Some(&path)).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(source, ConfigSource::File(path));
}

use brickstore_core::config::{ENV_BUSY_TIMEOUT_MS, ENV_LOG_LEVEL, ENV_MERGE_POLICY, ENV_TABLE};
use brickstore_core::{ConfigError, MergePolicy, StoreConfig, ITEM_TABLE};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

fn write_config(dir: &tempfile::TempDir, body: &serde_json::Value) -> PathBuf {
    let path = dir.path().join("brickstore.json");
    fs::write(&path, serde_json::to_vec_pretty(body).unwrap()).unwrap();
    path
}

#[test]
fn full_config_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &serde_json::json!({
            "db_path": "/var/lib/brickstore/items.db",
            "table_name": "Stock",
            "merge_policy": "overwrite",
            "log_level": "DEBUG",
            "log_dir": "/var/log/brickstore",
            "busy_timeout_ms": 1500
        }),
    );

    let config = StoreConfig::from_json_file(&path).unwrap();
    assert_eq!(config.db_path, PathBuf::from("/var/lib/brickstore/items.db"));
    assert_eq!(config.table_name, "Stock");
    assert_eq!(config.merge_policy, MergePolicy::Overwrite);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/brickstore")));
    assert_eq!(config.db_options().busy_timeout, Duration::from_millis(1500));
}

#[test]
fn missing_fields_take_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &serde_json::json!({ "busy_timeout_ms": 10 }));

    let config = StoreConfig::from_json_file(&path).unwrap();
    let defaults = StoreConfig::default();
    assert_eq!(config.table_name, ITEM_TABLE);
    assert_eq!(config.merge_policy, MergePolicy::Merge);
    assert_eq!(config.db_path, defaults.db_path);
    assert_eq!(config.busy_timeout_ms, 10);
}

#[test]
fn unknown_fields_and_bad_json_are_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &serde_json::json!({ "tabel_name": "Stock" }));
    assert!(matches!(
        StoreConfig::from_json_file(&path).unwrap_err(),
        ConfigError::Parse { .. }
    ));

    fs::write(&path, "{ not json").unwrap();
    let err = StoreConfig::from_json_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("brickstore.json"));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = StoreConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn invalid_values_in_file_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, &serde_json::json!({ "table_name": "9lives" }));
    assert!(matches!(
        StoreConfig::from_json_file(&path).unwrap_err(),
        ConfigError::InvalidValue {
            field: "table_name",
            ..
        }
    ));

    let path = write_config(&dir, &serde_json::json!({ "log_level": "loud" }));
    assert!(matches!(
        StoreConfig::from_json_file(&path).unwrap_err(),
        ConfigError::InvalidValue {
            field: "log_level",
            ..
        }
    ));
}

#[test]
fn environment_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &serde_json::json!({ "merge_policy": "overwrite", "log_level": "warn" }),
    );

    let config = StoreConfig::from_json_file(&path)
        .unwrap()
        .apply_env_overrides(|name| match name {
            ENV_MERGE_POLICY => Some("merge".to_string()),
            ENV_LOG_LEVEL => Some("".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.merge_policy, MergePolicy::Merge);
    assert_eq!(config.log_level, "warn");
}

// Only test in this binary that touches the process environment.
#[test]
fn from_env_reads_process_variables() {
    std::env::set_var(ENV_TABLE, "Warehouse");
    std::env::set_var(ENV_BUSY_TIMEOUT_MS, "750");
    let config = StoreConfig::from_env();
    std::env::remove_var(ENV_TABLE);
    std::env::remove_var(ENV_BUSY_TIMEOUT_MS);

    let config = config.unwrap();
    assert_eq!(config.table_name, "Warehouse");
    assert_eq!(config.db_options().busy_timeout, Duration::from_millis(750));
}

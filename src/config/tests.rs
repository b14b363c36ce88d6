//! Tests for the config module.

use super::*;
use crate::locks::{AcquireMode, LockBackend};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.database_url, "postgres://localhost:5432/postgres");
    assert_eq!(config.application_name, "recordlock");
    assert_eq!(config.lock_backend, BackendSelection::Auto);
    assert_eq!(config.registry_schema, "xt");
    assert_eq!(config.registry_table, "lock");
    assert_eq!(config.acquire_mode, AcquireMode::Interactive);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_partial_yaml_uses_defaults() {
    let yaml = r#"
database_url: postgres://erp@db.internal/prod
lock_backend: registry
"#;

    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.database_url, "postgres://erp@db.internal/prod");
    assert_eq!(config.lock_backend, BackendSelection::Registry);
    assert_eq!(config.registry_schema, "xt");
    assert_eq!(config.acquire_mode, AcquireMode::Interactive);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
acquire_mode: silent
future_option: true
"#;

    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.acquire_mode, AcquireMode::Silent);
}

#[test]
fn test_empty_yaml_is_default() {
    let config = Config::from_yaml("{}").unwrap();
    assert_eq!(config.lock_backend, BackendSelection::Auto);
}

#[test]
fn test_invalid_backend_rejected() {
    let result = Config::from_yaml("lock_backend: redis\n");
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("failed to parse"));
}

#[test]
fn test_validate_rejects_empty_database_url() {
    let config = Config {
        database_url: "  ".to_string(),
        ..Config::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("database_url"));
}

#[test]
fn test_validate_rejects_unsafe_registry_names() {
    for bad in ["", "Lock", "lock; drop table item", "1lock", "x\"t"] {
        let config = Config {
            registry_table: bad.to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err(), "accepted registry_table {:?}", bad);
    }

    let config = Config {
        registry_schema: "erp_locks".to_string(),
        ..Config::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn test_yaml_roundtrip_keeps_selection() {
    let config = Config {
        lock_backend: BackendSelection::Advisory,
        acquire_mode: AcquireMode::Silent,
        ..Config::default()
    };

    let yaml = config.to_yaml().unwrap();
    assert!(yaml.contains("lock_backend: advisory"));
    assert!(yaml.contains("acquire_mode: silent"));

    let parsed = Config::from_yaml(&yaml).unwrap();
    assert_eq!(parsed.lock_backend, BackendSelection::Advisory);
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "application_name: erp-client").unwrap();
    writeln!(file, "registry_schema: erp").unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.application_name, "erp-client");
    assert_eq!(config.registry_schema, "erp");
}

#[test]
fn test_load_missing_file_is_user_error() {
    let err = Config::load("/nonexistent/recordlock.yaml").unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_session_application_name_includes_host() {
    let config = Config::default();
    let name = config.session_application_name();
    assert!(name.starts_with("recordlock@"));
}

#[test]
fn test_backend_selection_forced() {
    assert_eq!(BackendSelection::Auto.forced(), None);
    assert_eq!(
        BackendSelection::Advisory.forced(),
        Some(LockBackend::Advisory)
    );
    assert_eq!(
        BackendSelection::from_str("registry"),
        Some(BackendSelection::Registry)
    );
    assert_eq!(BackendSelection::from_str("other"), None);
}

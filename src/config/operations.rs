//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{RecordLockError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Registry names are interpolated into SQL, so only plain identifiers pass.
static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("Invalid identifier regex"));

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the recordlock.yaml file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(RecordLockError::UserError)` - Parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            RecordLockError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(|e| {
            RecordLockError::UserError(format!("failed to parse config YAML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            RecordLockError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `database_url` must be non-empty
    /// - `application_name` must be non-empty
    /// - `registry_schema` and `registry_table` must be lower-case SQL identifiers
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(RecordLockError::UserError(
                "config validation failed: database_url must not be empty".to_string(),
            ));
        }

        if self.application_name.trim().is_empty() {
            return Err(RecordLockError::UserError(
                "config validation failed: application_name must not be empty".to_string(),
            ));
        }

        for (key, value) in [
            ("registry_schema", &self.registry_schema),
            ("registry_table", &self.registry_table),
        ] {
            if !IDENTIFIER_REGEX.is_match(value) {
                return Err(RecordLockError::UserError(format!(
                    "config validation failed: {} must be a lower-case SQL identifier (found '{}')",
                    key, value
                )));
            }
        }

        Ok(())
    }

    /// Application name as reported to the server: `name@host`.
    pub fn session_application_name(&self) -> String {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        format!("{}@{}", self.application_name, host)
    }
}

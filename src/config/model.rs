//! Config struct definition and default implementation.

use super::types::*;
use crate::locks::AcquireMode;
use serde::{Deserialize, Serialize};

/// Configuration for recordlock.
///
/// This struct represents the contents of `recordlock.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Connection settings
    // =========================================================================
    /// PostgreSQL connection URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Application name reported to the server; the host name is appended so
    /// lock listings show where a holder runs.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Which lock backend to use.
    #[serde(default)]
    pub lock_backend: BackendSelection,

    /// Schema of the lock registry table.
    #[serde(default = "default_registry_schema")]
    pub registry_schema: String,

    /// Name of the lock registry table.
    #[serde(default = "default_registry_table")]
    pub registry_table: String,

    /// Acquisition mode used by the CLI.
    #[serde(default)]
    pub acquire_mode: AcquireMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            application_name: default_application_name(),
            lock_backend: BackendSelection::default(),
            registry_schema: default_registry_schema(),
            registry_table: default_registry_table(),
            acquire_mode: AcquireMode::default(),
        }
    }
}

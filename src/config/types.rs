//! Config value types and serde defaults.

use crate::locks::LockBackend;
use serde::{Deserialize, Serialize};

/// How the lock backend is chosen when a lock context is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendSelection {
    /// Use the registry when its table exists, advisory locks otherwise.
    #[default]
    Auto,
    /// Always use advisory locks.
    Advisory,
    /// Always use the registry table.
    Registry,
}

impl BackendSelection {
    /// Parse a backend selection from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "advisory" => Some(Self::Advisory),
            "registry" => Some(Self::Registry),
            _ => None,
        }
    }

    /// The backend this selection forces, `None` for `Auto`.
    pub fn forced(&self) -> Option<LockBackend> {
        match self {
            Self::Auto => None,
            Self::Advisory => Some(LockBackend::Advisory),
            Self::Registry => Some(LockBackend::Registry),
        }
    }
}

// Default value functions for serde
pub(crate) fn default_database_url() -> String {
    "postgres://localhost:5432/postgres".to_string()
}
pub(crate) fn default_application_name() -> String {
    "recordlock".to_string()
}
pub(crate) fn default_registry_schema() -> String {
    "xt".to_string()
}
pub(crate) fn default_registry_table() -> String {
    "lock".to_string()
}

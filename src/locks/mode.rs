//! Acquisition modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a failed acquisition is surfaced.
///
/// In `Interactive` mode precondition failures, contention, and reported
/// backend errors are shown to the user through the context's presenter
/// before the call returns. `Silent` only records the message in
/// `last_error()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireMode {
    /// Record failures without showing them.
    Silent,
    /// Show failures to the user.
    #[default]
    Interactive,
}

impl AcquireMode {
    pub fn is_interactive(&self) -> bool {
        matches!(self, AcquireMode::Interactive)
    }

    /// Numeric value exposed to scripts (`Silent` = 0, `Interactive` = 1).
    pub fn as_i64(&self) -> i64 {
        match self {
            AcquireMode::Silent => 0,
            AcquireMode::Interactive => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(AcquireMode::Silent),
            1 => Some(AcquireMode::Interactive),
            _ => None,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "silent" => Some(AcquireMode::Silent),
            "interactive" => Some(AcquireMode::Interactive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcquireMode::Silent => "silent",
            AcquireMode::Interactive => "interactive",
        }
    }
}

impl fmt::Display for AcquireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Lock target, ownership, and listing types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which server-side mechanism backs record locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockBackend {
    /// Native advisory locks keyed by (table oid, record id).
    Advisory,
    /// Rows in the lock registry table keyed by (table oid, record id).
    Registry,
}

impl LockBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockBackend::Advisory => "advisory",
            LockBackend::Registry => "registry",
        }
    }
}

impl fmt::Display for LockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record a lock guards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockTarget {
    /// Table name, optionally schema-qualified.
    pub table: String,
    /// Record id within the table.
    pub id: i32,
}

impl LockTarget {
    pub fn new(table: impl Into<String>, id: i32) -> Self {
        Self {
            table: table.into(),
            id,
        }
    }

    /// A target can be locked only with a table name and a non-negative id.
    pub fn is_lockable(&self) -> bool {
        !self.table.is_empty() && self.id >= 0
    }
}

impl fmt::Display for LockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.table, self.id)
    }
}

/// Current owner of a record lock as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    /// The holder's backend pid equals the caller's.
    pub held_by_me: bool,
    /// The holder's session user name.
    pub holder: String,
    /// The holder's backend pid.
    pub holder_pid: Option<i64>,
}

/// A record lock found by listing.
#[derive(Debug, Clone, Serialize)]
pub struct LockInfo {
    pub table: String,
    pub record_id: i64,
    pub holder: String,
    pub holder_pid: Option<i64>,
    pub application_name: Option<String>,
    pub held_by_me: bool,
    /// When the lock was taken (registry mode only).
    pub since: Option<DateTime<Utc>>,
}

impl LockInfo {
    /// Time since the lock was taken, when known.
    pub fn age(&self) -> Option<Duration> {
        self.since
            .map(|since| Utc::now().signed_duration_since(since))
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> Option<String> {
        let age = self.age()?;
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        Some(if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        })
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (holder: {}", self.table, self.record_id, self.holder)?;
        if let Some(pid) = self.holder_pid {
            write!(f, ", pid: {}", pid)?;
        }
        if let Some(age) = self.age_string() {
            write!(f, ", age: {}", age)?;
        }
        if self.held_by_me {
            write!(f, ", MINE")?;
        }
        write!(f, ")")
    }
}

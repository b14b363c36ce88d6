//! Backing strategies for record locks.
//!
//! Both strategies key a lock by (table oid, record id) and answer the same
//! three questions: take it, who holds it, let it go. They differ only in
//! where the lock lives: a native advisory lock tied to the session, or a row
//! in the lock registry table.
//!
//! Every call returns `Ok(None)` when the statement ran but produced no row
//! (the table does not exist, nobody holds the lock); `Err` means the backend
//! call itself failed.

mod advisory;
mod registry;

pub use advisory::AdvisoryStrategy;
pub use registry::{RegistryStrategy, install_statements};

use super::types::{LockBackend, LockInfo, LockTarget, Ownership};
use crate::db::{Row, Session};
use crate::error::{BackendError, RecordLockError};

/// Server-side lock operations for one backend.
pub trait LockStrategy {
    fn backend(&self) -> LockBackend;

    /// Atomically take the lock for the calling session.
    ///
    /// `Some(false)` when the lock is already held, including by the caller.
    fn try_lock(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<bool>, BackendError>;

    /// Current holder of the lock, `None` when nobody holds it.
    fn query_ownership(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<Ownership>, BackendError>;

    /// Release the caller's lock. `Some(false)` or `None` when the caller did
    /// not hold it.
    fn unlock(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<bool>, BackendError>;

    /// Every record lock currently held.
    fn list_locks(&self, session: &mut dyn Session) -> Result<Vec<LockInfo>, BackendError>;

    /// Remove a lock whatever its holder. Returns the cleared lock, `None`
    /// when there was none.
    fn clear_lock(
        &self,
        _session: &mut dyn Session,
        _target: &LockTarget,
    ) -> Result<Option<LockInfo>, RecordLockError> {
        Err(RecordLockError::Unsupported(
            "clearing another session's lock".to_string(),
            self.backend().to_string(),
        ))
    }
}

/// Read the `locked` / `released` style single boolean column.
fn flag(row: Option<Row>, column: &str) -> Result<Option<bool>, BackendError> {
    match row {
        Some(row) => Ok(Some(row.bool(column)?.unwrap_or(false))),
        None => Ok(None),
    }
}

/// Decode an ownership row (`held_by_me`, `holder`, `holder_pid`).
fn ownership_from_row(row: &Row) -> Result<Ownership, BackendError> {
    Ok(Ownership {
        held_by_me: row.bool("held_by_me")?.unwrap_or(false),
        holder: row
            .text("holder")?
            .unwrap_or_else(|| "another session".to_string()),
        holder_pid: row.int("holder_pid")?,
    })
}

/// Decode a listing row.
fn lock_info_from_row(row: &Row) -> Result<LockInfo, BackendError> {
    Ok(LockInfo {
        table: row.text("table_name")?.unwrap_or_default(),
        record_id: row.int("record_id")?.unwrap_or(-1),
        holder: row
            .text("holder")?
            .unwrap_or_else(|| "unknown".to_string()),
        holder_pid: row.int("holder_pid")?,
        application_name: row.text("application_name")?,
        held_by_me: row.bool("held_by_me")?.unwrap_or(false),
        since: row.timestamp("since")?,
    })
}

/// Build the strategy for a resolved backend.
pub fn strategy_for(
    backend: LockBackend,
    registry_schema: &str,
    registry_table: &str,
) -> Box<dyn LockStrategy> {
    match backend {
        LockBackend::Advisory => Box::new(AdvisoryStrategy),
        LockBackend::Registry => Box::new(RegistryStrategy::new(registry_schema, registry_table)),
    }
}

//! Lock administration: listing, clearing, and installing the registry.
//!
//! These operate on the whole backend rather than one record lock and are
//! used by the CLI; they return `Result` instead of the coordinator's
//! boolean-plus-last-error style.

use super::context::LockContext;
use super::strategy::install_statements;
use super::types::{LockInfo, LockTarget};
use crate::config::Config;
use crate::db::Session;
use crate::error::{RecordLockError, Result};
use tracing::info;

/// List every record lock currently held, sorted by table and record id.
pub fn list_locks(ctx: &LockContext) -> Result<Vec<LockInfo>> {
    let mut locks = ctx.with_session(|strategy, session| strategy.list_locks(session))?;
    locks.sort_by(|a, b| (&a.table, a.record_id).cmp(&(&b.table, b.record_id)));
    Ok(locks)
}

/// Remove the lock on `table` / `id` whatever session holds it.
///
/// The caller is responsible for verifying that clearing the lock is
/// appropriate (e.g., checking --force). Only the registry backend supports
/// this; an advisory lock belongs to its session until that session ends.
///
/// # Returns
///
/// * `Ok(LockInfo)` - Information about the cleared lock
/// * `Err(RecordLockError::UserError)` - No such lock or invalid target
/// * `Err(RecordLockError::Unsupported)` - Advisory backend
pub fn clear_lock(ctx: &LockContext, table: &str, id: i32) -> Result<LockInfo> {
    let target = LockTarget::new(table, id);
    if !target.is_lockable() {
        return Err(RecordLockError::UserError(format!(
            "invalid lock target '{}': a table name and a non-negative record id are required",
            target
        )));
    }

    let cleared = ctx.with_session(|strategy, session| strategy.clear_lock(session, &target))?;

    match cleared {
        Some(lock) => {
            info!(table, id, holder = %lock.holder, "record lock cleared");
            Ok(lock)
        }
        None => Err(RecordLockError::UserError(format!(
            "no lock is held on {}",
            target
        ))),
    }
}

/// Create the lock registry (schema, table, and `trylock` function).
pub fn install_registry(session: &mut dyn Session, config: &Config) -> Result<()> {
    for query in install_statements(&config.registry_schema, &config.registry_table) {
        session.execute(&query)?;
    }
    info!(
        registry = %format!("{}.{}", config.registry_schema, config.registry_table),
        "lock registry installed"
    );
    Ok(())
}

//! Lock backend detection.

use super::types::LockBackend;
use crate::config::Config;
use crate::db::{Query, Session, Statement};
use crate::error::BackendError;
use tracing::info;

const PROBE_REGISTRY_SQL: &str = "\
SELECT EXISTS (SELECT 1
                 FROM pg_catalog.pg_class c
                 JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                WHERE c.relkind = 'r'
                  AND n.nspname = $1::text
                  AND c.relname = $2::text) AS registry_exists";

/// Ask the catalog whether the lock registry table exists.
pub fn probe_registry(
    session: &mut dyn Session,
    schema: &str,
    table: &str,
) -> Result<bool, BackendError> {
    let query = Query::new(Statement::ProbeRegistry, PROBE_REGISTRY_SQL)
        .bind(schema)
        .bind(table);

    match session.fetch_optional(&query)? {
        Some(row) => Ok(row.bool("registry_exists")?.unwrap_or(false)),
        None => Ok(false),
    }
}

/// Resolve the backend for this process.
///
/// An explicit `lock_backend` wins without touching the database; `auto`
/// probes the catalog once. The caller keeps the answer for the lifetime of
/// its lock context.
pub fn resolve_backend(
    session: &mut dyn Session,
    config: &Config,
) -> Result<LockBackend, BackendError> {
    if let Some(backend) = config.lock_backend.forced() {
        info!(backend = %backend, "lock backend set by configuration");
        return Ok(backend);
    }

    let backend = if probe_registry(session, &config.registry_schema, &config.registry_table)? {
        LockBackend::Registry
    } else {
        LockBackend::Advisory
    };

    info!(
        backend = %backend,
        registry = %format!("{}.{}", config.registry_schema, config.registry_table),
        "lock backend detected"
    );
    Ok(backend)
}

//! Native advisory lock strategy.
//!
//! A record lock is the two-key advisory lock `(table oid, record id)`. The
//! server ties it to the session that took it and drops it when that session
//! ends, which is how crashed clients give their locks back.

use super::{LockStrategy, flag, lock_info_from_row, ownership_from_row};
use crate::db::{Query, Session, Statement};
use crate::error::BackendError;
use crate::locks::types::{LockBackend, LockInfo, LockTarget, Ownership};

/// Refuses when the calling session already holds the key, so the server-side
/// lock count never goes above one and a single unlock always frees it.
const TRY_LOCK_SQL: &str = "\
SELECT CASE
         WHEN EXISTS (SELECT 1
                        FROM pg_catalog.pg_locks l
                       WHERE l.locktype = 'advisory'
                         AND l.objsubid = 2
                         AND l.pid = pg_backend_pid()
                         AND l.classid = c.oid
                         AND l.objid = $2::int4::oid)
         THEN false
         ELSE pg_try_advisory_lock(c.oid::int4, $2::int4)
       END AS locked
  FROM pg_catalog.pg_class c
 WHERE c.oid = to_regclass($1::text)";

const OWNERSHIP_SQL: &str = "\
SELECT l.pid = pg_backend_pid() AS held_by_me,
       a.usename::text AS holder,
       l.pid::int8 AS holder_pid
  FROM pg_catalog.pg_locks l
  JOIN pg_catalog.pg_stat_activity a ON a.pid = l.pid
 WHERE l.locktype = 'advisory'
   AND l.objsubid = 2
   AND l.granted
   AND l.database = (SELECT d.oid FROM pg_catalog.pg_database d WHERE d.datname = current_database())
   AND l.classid = to_regclass($1::text)::oid
   AND l.objid = $2::int4::oid
 ORDER BY held_by_me DESC
 LIMIT 1";

const UNLOCK_SQL: &str = "\
SELECT pg_advisory_unlock(c.oid::int4, $2::int4) AS released
  FROM pg_catalog.pg_class c
 WHERE c.oid = to_regclass($1::text)";

const LIST_SQL: &str = "\
SELECT c.relname::text AS table_name,
       l.objid::int8 AS record_id,
       a.usename::text AS holder,
       l.pid::int8 AS holder_pid,
       a.application_name::text AS application_name,
       l.pid = pg_backend_pid() AS held_by_me,
       NULL::timestamptz AS since
  FROM pg_catalog.pg_locks l
  JOIN pg_catalog.pg_class c ON c.oid = l.classid
  JOIN pg_catalog.pg_stat_activity a ON a.pid = l.pid
 WHERE l.locktype = 'advisory'
   AND l.objsubid = 2
   AND l.granted
   AND l.database = (SELECT d.oid FROM pg_catalog.pg_database d WHERE d.datname = current_database())
 ORDER BY 1, 2";

/// Advisory-lock backed record locks.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdvisoryStrategy;

fn keyed(statement: Statement, sql: &str, target: &LockTarget) -> Query {
    Query::new(statement, sql)
        .bind(target.table.as_str())
        .bind(target.id)
}

impl LockStrategy for AdvisoryStrategy {
    fn backend(&self) -> LockBackend {
        LockBackend::Advisory
    }

    fn try_lock(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<bool>, BackendError> {
        let row = session.fetch_optional(&keyed(Statement::AdvisoryTryLock, TRY_LOCK_SQL, target))?;
        flag(row, "locked")
    }

    fn query_ownership(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<Ownership>, BackendError> {
        let row =
            session.fetch_optional(&keyed(Statement::AdvisoryOwnership, OWNERSHIP_SQL, target))?;
        row.as_ref().map(ownership_from_row).transpose()
    }

    fn unlock(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<bool>, BackendError> {
        let row = session.fetch_optional(&keyed(Statement::AdvisoryUnlock, UNLOCK_SQL, target))?;
        flag(row, "released")
    }

    fn list_locks(&self, session: &mut dyn Session) -> Result<Vec<LockInfo>, BackendError> {
        session
            .fetch_all(&Query::new(Statement::AdvisoryList, LIST_SQL))?
            .iter()
            .map(lock_info_from_row)
            .collect()
    }
}

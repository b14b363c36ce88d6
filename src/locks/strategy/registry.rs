//! Lock registry table strategy.
//!
//! Used where clients reach the database through a pooled gateway and a
//! native advisory lock would not stay attached to one client. Each lock is a
//! row in the registry table holding the holder's backend pid and session
//! user. Rows are taken through the registry's `trylock` function, which first
//! drops rows whose pid no longer has a live session and then inserts the
//! caller's row under the (table oid, record id) unique key.

use super::{LockStrategy, flag, lock_info_from_row, ownership_from_row};
use crate::db::{Query, Session, Statement};
use crate::error::{BackendError, RecordLockError};
use crate::locks::types::{LockBackend, LockInfo, LockTarget, Ownership};

/// Registry-table backed record locks.
#[derive(Debug, Clone)]
pub struct RegistryStrategy {
    /// Quoted `"schema"` the registry lives in.
    schema: String,
    /// Quoted `"schema"."table"` of the registry.
    relation: String,
}

impl RegistryStrategy {
    /// Names must be plain identifiers; config validation enforces this.
    pub fn new(schema: &str, table: &str) -> Self {
        Self {
            schema: format!("\"{}\"", schema),
            relation: format!("\"{}\".\"{}\"", schema, table),
        }
    }

    fn keyed(&self, statement: Statement, sql: String, target: &LockTarget) -> Query {
        Query::new(statement, sql)
            .bind(target.table.as_str())
            .bind(target.id)
    }

    fn try_lock_sql(&self) -> String {
        format!(
            "SELECT {schema}.trylock(c.oid, $2::int4) AS locked \
               FROM pg_catalog.pg_class c \
              WHERE c.oid = to_regclass($1::text)",
            schema = self.schema
        )
    }

    fn ownership_sql(&self) -> String {
        format!(
            "SELECT l.lock_pid = pg_backend_pid() AS held_by_me, \
                    a.usename::text AS holder, \
                    l.lock_pid::int8 AS holder_pid \
               FROM {relation} l \
               JOIN pg_catalog.pg_stat_activity a ON a.pid = l.lock_pid \
              WHERE l.lock_table_oid = to_regclass($1::text)::oid \
                AND l.lock_record_id = $2::int4",
            relation = self.relation
        )
    }

    fn unlock_sql(&self) -> String {
        format!(
            "DELETE FROM {relation} l \
              WHERE l.lock_table_oid = to_regclass($1::text)::oid \
                AND l.lock_record_id = $2::int4 \
                AND l.lock_pid = pg_backend_pid() \
          RETURNING true AS released",
            relation = self.relation
        )
    }

    fn list_sql(&self) -> String {
        format!(
            "SELECT c.relname::text AS table_name, \
                    l.lock_record_id::int8 AS record_id, \
                    a.usename::text AS holder, \
                    l.lock_pid::int8 AS holder_pid, \
                    a.application_name::text AS application_name, \
                    l.lock_pid = pg_backend_pid() AS held_by_me, \
                    l.lock_effective AS since \
               FROM {relation} l \
               JOIN pg_catalog.pg_class c ON c.oid = l.lock_table_oid \
               JOIN pg_catalog.pg_stat_activity a ON a.pid = l.lock_pid \
              ORDER BY 1, 2",
            relation = self.relation
        )
    }

    fn clear_sql(&self) -> String {
        format!(
            "DELETE FROM {relation} l \
              USING pg_catalog.pg_class c \
              WHERE c.oid = l.lock_table_oid \
                AND c.oid = to_regclass($1::text) \
                AND l.lock_record_id = $2::int4 \
          RETURNING c.relname::text AS table_name, \
                    l.lock_record_id::int8 AS record_id, \
                    l.lock_username AS holder, \
                    l.lock_pid::int8 AS holder_pid, \
                    NULL::text AS application_name, \
                    l.lock_pid = pg_backend_pid() AS held_by_me, \
                    l.lock_effective AS since",
            relation = self.relation
        )
    }
}

impl LockStrategy for RegistryStrategy {
    fn backend(&self) -> LockBackend {
        LockBackend::Registry
    }

    fn try_lock(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<bool>, BackendError> {
        let query = self.keyed(Statement::RegistryTryLock, self.try_lock_sql(), target);
        flag(session.fetch_optional(&query)?, "locked")
    }

    fn query_ownership(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<Ownership>, BackendError> {
        let query = self.keyed(Statement::RegistryOwnership, self.ownership_sql(), target);
        session
            .fetch_optional(&query)?
            .as_ref()
            .map(ownership_from_row)
            .transpose()
    }

    fn unlock(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<bool>, BackendError> {
        let query = self.keyed(Statement::RegistryUnlock, self.unlock_sql(), target);
        flag(session.fetch_optional(&query)?, "released")
    }

    fn list_locks(&self, session: &mut dyn Session) -> Result<Vec<LockInfo>, BackendError> {
        session
            .fetch_all(&Query::new(Statement::RegistryList, self.list_sql()))?
            .iter()
            .map(lock_info_from_row)
            .collect()
    }

    fn clear_lock(
        &self,
        session: &mut dyn Session,
        target: &LockTarget,
    ) -> Result<Option<LockInfo>, RecordLockError> {
        let query = self.keyed(Statement::RegistryClear, self.clear_sql(), target);
        let cleared = session
            .fetch_optional(&query)?
            .as_ref()
            .map(lock_info_from_row)
            .transpose()?;
        Ok(cleared)
    }
}

/// DDL creating the registry: schema, table with its unique key, and the
/// atomic `trylock(oid, integer)` function.
///
/// Every statement is idempotent so installing twice is harmless.
pub fn install_statements(schema: &str, table: &str) -> Vec<Query> {
    let schema_ident = format!("\"{}\"", schema);
    let relation = format!("\"{}\".\"{}\"", schema, table);

    let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", schema_ident);

    let create_table = format!(
        "CREATE TABLE IF NOT EXISTS {relation} (\
             lock_id serial PRIMARY KEY, \
             lock_table_oid oid NOT NULL, \
             lock_record_id integer NOT NULL, \
             lock_pid integer NOT NULL, \
             lock_username text NOT NULL DEFAULT session_user, \
             lock_effective timestamptz NOT NULL DEFAULT now(), \
             UNIQUE (lock_table_oid, lock_record_id))"
    );

    let create_function = format!(
        "CREATE OR REPLACE FUNCTION {schema_ident}.trylock(p_table_oid oid, p_record_id integer) \
         RETURNS boolean LANGUAGE plpgsql AS $fn$ \
         BEGIN \
           DELETE FROM {relation} \
            WHERE lock_table_oid = p_table_oid \
              AND lock_record_id = p_record_id \
              AND lock_pid NOT IN (SELECT pid FROM pg_catalog.pg_stat_activity); \
           INSERT INTO {relation} (lock_table_oid, lock_record_id, lock_pid, lock_username) \
           VALUES (p_table_oid, p_record_id, pg_backend_pid(), session_user) \
           ON CONFLICT (lock_table_oid, lock_record_id) DO NOTHING; \
           RETURN FOUND; \
         END; \
         $fn$"
    );

    vec![
        Query::new(Statement::RegistryInstall, create_schema),
        Query::new(Statement::RegistryInstall, create_table),
        Query::new(Statement::RegistryInstall, create_function),
    ]
}

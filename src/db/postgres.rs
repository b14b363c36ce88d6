//! PostgreSQL session over sqlx.
//!
//! The coordinator is synchronous, so each session owns a current-thread tokio
//! runtime and blocks on every call.

use super::query::{Query, Row, Value};
use super::session::Session;
use crate::error::BackendError;
use chrono::{DateTime, Utc};
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, ConnectOptions, Connection, Postgres, Row as _, TypeInfo};
use std::str::FromStr;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

type SqlxQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// A blocking PostgreSQL session.
///
/// Advisory locks live exactly as long as this session: closing it (or the
/// process dying) releases every lock it holds.
pub struct PgSession {
    runtime: Runtime,
    conn: Option<PgConnection>,
}

impl PgSession {
    /// Connect to `database_url`, reporting `application_name` to the server
    /// so other sessions can see who holds a lock.
    pub fn connect(database_url: &str, application_name: &str) -> Result<Self, BackendError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BackendError::new(format!("failed to start database runtime: {}", e)))?;

        let options = PgConnectOptions::from_str(database_url)?.application_name(application_name);
        let conn = runtime.block_on(options.connect())?;
        debug!(application_name, "database session opened");

        Ok(Self {
            runtime,
            conn: Some(conn),
        })
    }

    /// Close the session. Safe to call more than once.
    pub fn close(&mut self) -> Result<(), BackendError> {
        if let Some(conn) = self.conn.take() {
            self.runtime.block_on(conn.close())?;
            debug!("database session closed");
        }
        Ok(())
    }

    fn prepare(query: &Query) -> SqlxQuery<'_> {
        let mut prepared = sqlx::query(&query.sql);
        for param in &query.params {
            prepared = match param {
                Value::Null => prepared.bind(Option::<String>::None),
                Value::Bool(v) => prepared.bind(*v),
                Value::Int(v) => prepared.bind(*v),
                Value::Text(v) => prepared.bind(v.as_str()),
                Value::Timestamp(v) => prepared.bind(*v),
            };
        }
        prepared
    }

    /// Map a sqlx failure, dropping the connection when the socket is gone.
    fn fail(&mut self, err: sqlx::Error) -> BackendError {
        if matches!(err, sqlx::Error::Io(_)) {
            warn!("database connection lost: {}", err);
            self.conn = None;
        }
        BackendError::from(err)
    }
}

impl Session for PgSession {
    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn fetch_optional(&mut self, query: &Query) -> Result<Option<Row>, BackendError> {
        let conn = self.conn.as_mut().ok_or_else(BackendError::closed)?;
        debug!(statement = %query.statement, "fetch_optional");
        let result = self
            .runtime
            .block_on(Self::prepare(query).fetch_optional(&mut *conn));
        match result {
            Ok(row) => row.as_ref().map(decode_row).transpose(),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fetch_all(&mut self, query: &Query) -> Result<Vec<Row>, BackendError> {
        let conn = self.conn.as_mut().ok_or_else(BackendError::closed)?;
        debug!(statement = %query.statement, "fetch_all");
        let result = self
            .runtime
            .block_on(Self::prepare(query).fetch_all(&mut *conn));
        match result {
            Ok(rows) => rows.iter().map(decode_row).collect(),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn execute(&mut self, query: &Query) -> Result<u64, BackendError> {
        let conn = self.conn.as_mut().ok_or_else(BackendError::closed)?;
        debug!(statement = %query.statement, "execute");
        let result = self
            .runtime
            .block_on(Self::prepare(query).execute(&mut *conn));
        match result {
            Ok(done) => Ok(done.rows_affected()),
            Err(e) => Err(self.fail(e)),
        }
    }
}

/// Convert a sqlx row into named [`Value`]s by the column's server type.
fn decode_row(row: &PgRow) -> Result<Row, BackendError> {
    let mut decoded = Row::new();

    for column in row.columns() {
        let index = column.ordinal();
        let value: Value = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(index)?.into(),
            "INT2" => row
                .try_get::<Option<i16>, _>(index)?
                .map(i64::from)
                .into(),
            "INT4" => row
                .try_get::<Option<i32>, _>(index)?
                .map(i64::from)
                .into(),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.into(),
            "OID" => row
                .try_get::<Option<Oid>, _>(index)?
                .map(|oid| i64::from(oid.0))
                .into(),
            "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" => {
                row.try_get::<Option<String>, _>(index)?.into()
            }
            "TIMESTAMPTZ" => row.try_get::<Option<DateTime<Utc>>, _>(index)?.into(),
            other => {
                return Err(BackendError::new(format!(
                    "unsupported column type {} for '{}'",
                    other,
                    column.name()
                )));
            }
        };
        decoded.push(column.name(), value);
    }

    Ok(decoded)
}

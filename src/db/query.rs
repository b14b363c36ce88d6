//! Query, row, and value types exchanged with a [`Session`](super::Session).

use crate::error::BackendError;
use chrono::{DateTime, Utc};
use std::fmt;

/// The backend contract a query fulfils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Does the lock registry table exist?
    ProbeRegistry,
    /// Native advisory try-lock.
    AdvisoryTryLock,
    /// Who holds the advisory lock for a record.
    AdvisoryOwnership,
    /// Native advisory unlock.
    AdvisoryUnlock,
    /// Every advisory record lock in the cluster.
    AdvisoryList,
    /// Registry try-lock (stored function).
    RegistryTryLock,
    /// Who holds the registry row for a record.
    RegistryOwnership,
    /// Delete the caller's registry row.
    RegistryUnlock,
    /// Every live registry row.
    RegistryList,
    /// Delete a registry row whatever its holder.
    RegistryClear,
    /// Registry DDL.
    RegistryInstall,
}

impl Statement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statement::ProbeRegistry => "probe_registry",
            Statement::AdvisoryTryLock => "advisory_try_lock",
            Statement::AdvisoryOwnership => "advisory_ownership",
            Statement::AdvisoryUnlock => "advisory_unlock",
            Statement::AdvisoryList => "advisory_list",
            Statement::RegistryTryLock => "registry_try_lock",
            Statement::RegistryOwnership => "registry_ownership",
            Statement::RegistryUnlock => "registry_unlock",
            Statement::RegistryList => "registry_list",
            Statement::RegistryClear => "registry_clear",
            Statement::RegistryInstall => "registry_install",
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// A parameterized statement.
///
/// Parameters are positional (`$1`, `$2`, ...) in the order they were bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub statement: Statement,
    pub sql: String,
    pub params: Vec<Value>,
}

impl Query {
    pub fn new(statement: Statement, sql: impl Into<String>) -> Self {
        Self {
            statement,
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Parameter at `index` (0-based), if bound.
    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }

    pub fn text_param(&self, index: usize) -> Option<&str> {
        match self.params.get(index) {
            Some(Value::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int_param(&self, index: usize) -> Option<i64> {
        match self.params.get(index) {
            Some(Value::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

/// One result row with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: impl Into<Value>) {
        self.columns.push((name.to_string(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    fn require(&self, name: &str) -> Result<&Value, BackendError> {
        self.get(name)
            .ok_or_else(|| BackendError::new(format!("result has no column '{}'", name)))
    }

    fn mistyped(name: &str, expected: &str, found: &Value) -> BackendError {
        BackendError::new(format!(
            "column '{}' is not {} (found {:?})",
            name, expected, found
        ))
    }

    /// Boolean column; SQL NULL reads as `None`.
    pub fn bool(&self, name: &str) -> Result<Option<bool>, BackendError> {
        match self.require(name)? {
            Value::Null => Ok(None),
            Value::Bool(v) => Ok(Some(*v)),
            other => Err(Self::mistyped(name, "a boolean", other)),
        }
    }

    /// Integer column; SQL NULL reads as `None`.
    pub fn int(&self, name: &str) -> Result<Option<i64>, BackendError> {
        match self.require(name)? {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v)),
            other => Err(Self::mistyped(name, "an integer", other)),
        }
    }

    /// Text column; SQL NULL reads as `None`.
    pub fn text(&self, name: &str) -> Result<Option<String>, BackendError> {
        match self.require(name)? {
            Value::Null => Ok(None),
            Value::Text(v) => Ok(Some(v.clone())),
            other => Err(Self::mistyped(name, "text", other)),
        }
    }

    /// Timestamp column; SQL NULL reads as `None`.
    pub fn timestamp(&self, name: &str) -> Result<Option<DateTime<Utc>>, BackendError> {
        match self.require(name)? {
            Value::Null => Ok(None),
            Value::Timestamp(v) => Ok(Some(*v)),
            other => Err(Self::mistyped(name, "a timestamp", other)),
        }
    }
}

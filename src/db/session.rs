//! The session abstraction shared by every lock handle in a process.

use super::query::{Query, Row};
use crate::error::BackendError;

/// One database session.
///
/// Advisory locks and the registry's holder pid are tied to the session, so
/// every lock handle of a process shares the same session.
pub trait Session {
    /// Whether the session can still run statements.
    fn is_open(&self) -> bool;

    /// Run a query and return its first row, if any.
    fn fetch_optional(&mut self, query: &Query) -> Result<Option<Row>, BackendError>;

    /// Run a query and return every row.
    fn fetch_all(&mut self, query: &Query) -> Result<Vec<Row>, BackendError>;

    /// Run a statement and return the number of affected rows.
    fn execute(&mut self, query: &Query) -> Result<u64, BackendError>;
}

//! Error types for recordlock.
//!
//! Uses thiserror for derive macros. The coordinator itself reports through
//! boolean results and `last_error()`; these types cover the session layer,
//! configuration, administration, and the CLI.

use crate::exit_codes;
use thiserror::Error;

/// A failed database call: connectivity, syntax, permission, or a row that
/// does not have the expected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    /// Backend error text, shown verbatim to the user.
    pub message: String,

    /// SQLSTATE code when the server supplied one.
    pub code: Option<String>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// The session was closed before or during the call.
    pub fn closed() -> Self {
        Self::new("database session is closed")
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db) => {
                let code = db.code().map(|c| c.to_string());
                let message = db.message().to_string();
                match code {
                    Some(code) => Self::new(message).with_code(code),
                    None => Self::new(message),
                }
            }
            None => Self::new(err.to_string()),
        }
    }
}

/// Main error type for recordlock operations outside the coordinator.
#[derive(Error, Debug)]
pub enum RecordLockError {
    /// Invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),

    /// The database call failed.
    #[error("Database error: {0}")]
    Backend(#[from] BackendError),

    /// The record lock could not be acquired.
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    /// The active lock backend cannot perform the operation.
    #[error("{0} is not supported by the {1} backend")]
    Unsupported(String, String),
}

impl RecordLockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RecordLockError::UserError(_) => exit_codes::USER_ERROR,
            RecordLockError::Backend(_) => exit_codes::BACKEND_FAILURE,
            RecordLockError::LockError(_) => exit_codes::LOCK_FAILURE,
            RecordLockError::Unsupported(_, _) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for recordlock operations.
pub type Result<T> = std::result::Result<T, RecordLockError>;

//! Error reporting and presentation collaborators.
//!
//! The coordinator never decides on its own how a backend failure reaches the
//! user. It hands the failure to an [`ErrorReporter`], which logs it, shows it
//! through a [`Presenter`] when one is supplied (interactive mode), and returns
//! whether the failure counts as reported for the current call.

use crate::error::BackendError;
use std::fmt;
use tracing::{error, warn};

/// Severity level for reported failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Potential problem, the operation may still be usable.
    Warning,
    /// The operation failed.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Shows a message to the user and returns once it has been acknowledged.
pub trait Presenter {
    fn critical(&self, title: &str, message: &str);
}

/// Presenter for headless processes: messages go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn critical(&self, title: &str, message: &str) {
        error!(title, "{}", message);
    }
}

/// Decides what happens to a failed backend call.
pub trait ErrorReporter {
    /// Returns `true` when the failure is treated as reported for this call;
    /// the caller then records the backend text as its last error.
    fn report(
        &self,
        severity: Severity,
        presenter: Option<&dyn Presenter>,
        context: &str,
        error: &BackendError,
    ) -> bool;
}

/// Logs every failure, presents it when a presenter is given, and always
/// reports it.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardErrorReporter;

impl ErrorReporter for StandardErrorReporter {
    fn report(
        &self,
        severity: Severity,
        presenter: Option<&dyn Presenter>,
        context: &str,
        err: &BackendError,
    ) -> bool {
        let code = err.code.as_deref().unwrap_or("");
        match severity {
            Severity::Warning => warn!(code, "{}: {}", context, err),
            Severity::Critical => error!(code, "{}: {}", context, err),
        }

        if let Some(presenter) = presenter {
            presenter.critical(context, &err.message);
        }

        true
    }
}

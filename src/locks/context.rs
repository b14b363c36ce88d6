//! Process-wide lock context.
//!
//! A [`LockContext`] bundles what every record lock of a process shares: the
//! database session, the backend strategy resolved once at startup, and the
//! error reporting collaborators. Cloning it is cheap; every clone refers to
//! the same session and strategy.
//!
//! The context also counts how many of its handles hold each record. The
//! server sees one session, so the lock is only given back when the last of
//! those handles releases it.

use super::backend::resolve_backend;
use super::record::RecordLock;
use super::report::{ErrorReporter, LogPresenter, Presenter, StandardErrorReporter};
use super::strategy::{LockStrategy, strategy_for};
use super::types::LockBackend;
use crate::config::Config;
use crate::db::Session;
use crate::error::BackendError;
use super::types::LockTarget;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared state for the record locks of one process.
#[derive(Clone)]
pub struct LockContext {
    session: Rc<RefCell<dyn Session>>,
    strategy: Rc<dyn LockStrategy>,
    reporter: Rc<dyn ErrorReporter>,
    presenter: Rc<dyn Presenter>,
    holds: Rc<RefCell<HashMap<LockTarget, usize>>>,
}

impl LockContext {
    /// Build a context around an already chosen strategy.
    pub fn new(session: Rc<RefCell<dyn Session>>, strategy: Box<dyn LockStrategy>) -> Self {
        Self {
            session,
            strategy: Rc::from(strategy),
            reporter: Rc::new(StandardErrorReporter),
            presenter: Rc::new(LogPresenter),
            holds: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Resolve the backend according to `config` and build the context.
    ///
    /// With `lock_backend: auto` this probes the catalog once; the result is
    /// fixed for this context and every clone of it.
    pub fn resolve(
        session: Rc<RefCell<dyn Session>>,
        config: &Config,
    ) -> Result<Self, BackendError> {
        let backend = {
            let mut guard = session
                .try_borrow_mut()
                .map_err(|_| BackendError::new("database session is busy"))?;
            resolve_backend(&mut *guard, config)?
        };

        let strategy = strategy_for(backend, &config.registry_schema, &config.registry_table);
        Ok(Self::new(session, strategy))
    }

    /// Replace the error reporter.
    pub fn with_reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Rc::new(reporter);
        self
    }

    /// Replace the presenter used in interactive mode.
    pub fn with_presenter(mut self, presenter: impl Presenter + 'static) -> Self {
        self.presenter = Rc::new(presenter);
        self
    }

    pub fn backend(&self) -> LockBackend {
        self.strategy.backend()
    }

    /// Whether the shared session can run statements.
    pub fn is_open(&self) -> bool {
        self.session
            .try_borrow()
            .map(|session| session.is_open())
            .unwrap_or(false)
    }

    /// A new unbound record lock.
    pub fn record_lock(&self) -> RecordLock {
        RecordLock::new(self.clone())
    }

    /// A new record lock bound to `table` / `id`.
    pub fn record_lock_for(&self, table: &str, id: i32) -> RecordLock {
        RecordLock::with_target(self.clone(), table, id)
    }

    pub(crate) fn reporter(&self) -> &dyn ErrorReporter {
        self.reporter.as_ref()
    }

    pub(crate) fn presenter(&self) -> &dyn Presenter {
        self.presenter.as_ref()
    }

    /// Number of this context's handles holding `target`.
    pub(crate) fn hold_count(&self, target: &LockTarget) -> usize {
        self.holds.borrow().get(target).copied().unwrap_or(0)
    }

    /// Record one more handle holding `target`.
    pub(crate) fn retain_hold(&self, target: &LockTarget) {
        *self.holds.borrow_mut().entry(target.clone()).or_insert(0) += 1;
    }

    /// Forget one handle's hold on `target`; returns how many remain.
    pub(crate) fn release_hold(&self, target: &LockTarget) -> usize {
        let mut holds = self.holds.borrow_mut();
        match holds.get_mut(target) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            }
            _ => {
                holds.remove(target);
                0
            }
        }
    }

    /// Run `f` with the strategy and exclusive use of the session.
    pub(crate) fn with_session<T, E: From<BackendError>>(
        &self,
        f: impl FnOnce(&dyn LockStrategy, &mut dyn Session) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut session = self
            .session
            .try_borrow_mut()
            .map_err(|_| BackendError::new("database session is busy"))?;
        f(self.strategy.as_ref(), &mut *session)
    }
}

impl std::fmt::Debug for LockContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockContext")
            .field("backend", &self.backend())
            .field("open", &self.is_open())
            .finish()
    }
}

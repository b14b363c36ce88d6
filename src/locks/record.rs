//! The record lock coordinator.

use super::context::LockContext;
use super::mode::AcquireMode;
use super::report::Severity;
use super::types::LockTarget;
use crate::error::BackendError;
use std::fmt;
use tracing::{debug, warn};

/// Message for an acquisition without a lockable target.
pub const NO_TARGET_MESSAGE: &str = "cannot acquire a lock without a table and record id";

/// Message for an acquisition on a closed session.
pub const NO_SESSION_MESSAGE: &str = "cannot acquire a lock without an open database session";

const LOCKING_ERROR_TITLE: &str = "Locking Error";
const CANNOT_LOCK_TITLE: &str = "Cannot Lock Record";
const LOCKED_TITLE: &str = "Record Locked";

/// Guards one record while it is open for editing.
///
/// Create one per edit session, [`acquire`](Self::acquire) before allowing
/// edits, and let it drop when the edit session ends: dropping releases the
/// lock whatever the reason the session ended.
///
/// Operations report success as `bool`; the reason for a failure is in
/// [`last_error`](Self::last_error), which every operation clears first.
/// `holds_lock()` and `is_locked_out()` are never both true.
pub struct RecordLock {
    ctx: LockContext,
    target: LockTarget,
    my_lock: bool,
    other_lock: bool,
    holder: String,
    last_error: String,
    /// Whether this handle counts towards the context's hold on the target.
    counted: bool,
}

impl RecordLock {
    /// An unbound lock. It is inert until [`bind`](Self::bind) gives it a
    /// table and a non-negative id.
    pub fn new(ctx: LockContext) -> Self {
        Self {
            ctx,
            target: LockTarget::new(String::new(), -1),
            my_lock: false,
            other_lock: false,
            holder: String::new(),
            last_error: String::new(),
            counted: false,
        }
    }

    pub fn with_target(ctx: LockContext, table: &str, id: i32) -> Self {
        let mut lock = Self::new(ctx);
        lock.target = LockTarget::new(table, id);
        lock
    }

    pub fn table(&self) -> &str {
        &self.target.table
    }

    pub fn id(&self) -> i32 {
        self.target.id
    }

    /// User name of the session holding the lock when it is not us.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Point the lock at another record.
    ///
    /// Fails while a lock on a different record is held; release it first.
    /// Never takes or releases a lock itself.
    pub fn bind(&mut self, table: &str, id: i32) -> bool {
        self.last_error.clear();

        let same = self.target.table == table && self.target.id == id;
        if same {
            return true;
        }

        if self.my_lock {
            self.last_error = format!(
                "cannot move the lock held on {} to {} {}; release it first",
                self.target, table, id
            );
            return false;
        }

        self.target = LockTarget::new(table, id);
        self.other_lock = false;
        self.holder.clear();
        true
    }

    /// Try to take the lock on the bound record.
    ///
    /// Succeeds when the lock was free, or when this session already holds
    /// it. Fails without waiting when another session holds it; the holder's
    /// name is then in [`holder`](Self::holder) and in the error message.
    pub fn acquire(&mut self, mode: AcquireMode) -> bool {
        self.last_error.clear();

        if !self.ctx.is_open() {
            self.last_error = NO_SESSION_MESSAGE.to_string();
            return false;
        }

        if !self.target.is_lockable() {
            self.last_error = NO_TARGET_MESSAGE.to_string();
            if mode.is_interactive() {
                self.ctx
                    .presenter()
                    .critical(CANNOT_LOCK_TITLE, &self.last_error);
            }
            return false;
        }

        let target = self.target.clone();
        match self
            .ctx
            .with_session(|strategy, session| strategy.try_lock(session, &target))
        {
            Ok(Some(true)) => {
                self.take_hold();
                self.my_lock = true;
                self.other_lock = false;
                self.holder.clear();
                debug!(table = %self.target.table, id = self.target.id, "record lock acquired");
                true
            }
            Ok(_) => self.explain_refusal(mode),
            Err(err) => {
                self.report(Severity::Critical, mode, &err);
                false
            }
        }
    }

    /// [`bind`](Self::bind) then [`acquire`](Self::acquire).
    pub fn acquire_target(&mut self, table: &str, id: i32, mode: AcquireMode) -> bool {
        if !self.bind(table, id) {
            if mode.is_interactive() {
                self.ctx
                    .presenter()
                    .critical(CANNOT_LOCK_TITLE, &self.last_error);
            }
            return false;
        }
        self.acquire(mode)
    }

    /// Whether this handle believes it holds the lock. No I/O.
    pub fn holds_lock(&self) -> bool {
        self.my_lock
    }

    /// Whether another session holds the lock right now.
    ///
    /// Always asks the backend; other sessions come and go between calls.
    pub fn is_locked_out(&mut self) -> bool {
        self.last_error.clear();

        if !self.target.is_lockable() || !self.ctx.is_open() {
            return false;
        }

        self.refresh(AcquireMode::Silent);
        self.other_lock
    }

    /// Give the lock back.
    ///
    /// Succeeds without I/O when nothing is bound, the session is closed, or
    /// this handle does not hold the lock, so it is safe to call repeatedly.
    /// While other handles of the same context still hold the record, only
    /// this handle's share is dropped and the server lock stays. On a backend
    /// failure the flags are kept and `false` is returned.
    pub fn release(&mut self) -> bool {
        self.last_error.clear();

        if !self.target.is_lockable() || !self.ctx.is_open() || !self.my_lock {
            self.drop_hold();
            return true;
        }

        if !self.counted || self.ctx.hold_count(&self.target) > 1 {
            self.drop_hold();
            self.my_lock = false;
            self.other_lock = false;
            self.holder.clear();
            debug!(
                table = %self.target.table,
                id = self.target.id,
                "record lock still held by another handle of this session"
            );
            return true;
        }

        let target = self.target.clone();
        match self
            .ctx
            .with_session(|strategy, session| strategy.unlock(session, &target))
        {
            Ok(released) => {
                if released != Some(true) {
                    warn!(
                        table = %self.target.table,
                        id = self.target.id,
                        "record lock was no longer held by this session"
                    );
                }
                self.drop_hold();
                self.my_lock = false;
                self.other_lock = false;
                self.holder.clear();
                debug!(table = %self.target.table, id = self.target.id, "record lock released");
                true
            }
            Err(err) => {
                self.report(Severity::Warning, AcquireMode::Silent, &err);
                if self.last_error.is_empty() {
                    self.last_error = err.message;
                }
                false
            }
        }
    }

    /// The try-lock was refused: find out whether by us or by someone else.
    fn explain_refusal(&mut self, mode: AcquireMode) -> bool {
        if !self.refresh(mode) {
            return false;
        }

        if self.my_lock {
            self.take_hold();
            debug!(table = %self.target.table, id = self.target.id, "record lock already held");
            return true;
        }

        self.last_error = if self.other_lock {
            format!(
                "{} {} is currently locked by {}",
                self.target.table, self.target.id, self.holder
            )
        } else {
            format!("could not acquire a lock on {}", self.target)
        };

        debug!(
            table = %self.target.table,
            id = self.target.id,
            holder = %self.holder,
            "record lock refused"
        );

        if mode.is_interactive() {
            self.ctx.presenter().critical(LOCKED_TITLE, &self.last_error);
        }
        false
    }

    /// Re-read ownership from the backend.
    ///
    /// No row means nobody holds the lock and both flags are cleared. Returns
    /// `false` only when a backend failure was reported, leaving the flags as
    /// they were.
    fn refresh(&mut self, mode: AcquireMode) -> bool {
        let target = self.target.clone();
        let result = self
            .ctx
            .with_session(|strategy, session| strategy.query_ownership(session, &target));

        match result {
            Ok(Some(ownership)) => {
                if !ownership.held_by_me {
                    self.drop_hold();
                }
                self.my_lock = ownership.held_by_me;
                self.other_lock = !ownership.held_by_me;
                if self.other_lock {
                    self.holder = ownership.holder;
                } else {
                    self.holder.clear();
                }
                true
            }
            Ok(None) => {
                self.clear_ownership();
                true
            }
            Err(err) => {
                if self.report(Severity::Critical, mode, &err) {
                    return false;
                }
                self.clear_ownership();
                true
            }
        }
    }

    fn clear_ownership(&mut self) {
        if self.my_lock {
            warn!(
                table = %self.target.table,
                id = self.target.id,
                "backend shows no lock on a record this handle believed it held"
            );
        }
        self.drop_hold();
        self.my_lock = false;
        self.other_lock = false;
        self.holder.clear();
    }

    /// Count this handle towards the context's hold on the target.
    fn take_hold(&mut self) {
        if !self.counted {
            self.ctx.retain_hold(&self.target);
            self.counted = true;
        }
    }

    fn drop_hold(&mut self) {
        if self.counted {
            self.ctx.release_hold(&self.target);
            self.counted = false;
        }
    }

    /// Hand a backend failure to the reporter. When reported, the backend
    /// text becomes the last error.
    fn report(&mut self, severity: Severity, mode: AcquireMode, err: &BackendError) -> bool {
        let presenter = mode.is_interactive().then(|| self.ctx.presenter());
        let reported = self
            .ctx
            .reporter()
            .report(severity, presenter, LOCKING_ERROR_TITLE, err);
        if reported {
            self.last_error = err.message.clone();
        }
        reported
    }
}

impl fmt::Display for RecordLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.my_lock {
            "held".to_string()
        } else if self.other_lock {
            format!("locked by {}", self.holder)
        } else {
            "not held".to_string()
        };
        write!(
            f,
            "RecordLock({}, {}, {})",
            self.target.table, self.target.id, state
        )
    }
}

impl fmt::Debug for RecordLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordLock")
            .field("target", &self.target)
            .field("my_lock", &self.my_lock)
            .field("other_lock", &self.other_lock)
            .field("holder", &self.holder)
            .field("last_error", &self.last_error)
            .field("counted", &self.counted)
            .finish()
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        if !self.release() {
            warn!(
                table = %self.target.table,
                id = self.target.id,
                "failed to release record lock: {}",
                self.last_error
            );
        }
    }
}

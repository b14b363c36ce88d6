//! Record locking subsystem.
//!
//! Several client processes, each with its own database session, must agree
//! on which one of them may edit a business record. A [`RecordLock`] guards
//! one record for the duration of an edit session; mutual exclusion is left to
//! the database.
//!
//! # Backends
//!
//! - **Advisory**: a native advisory lock keyed by (table oid, record id),
//!   released explicitly or when the holding session ends.
//! - **Registry**: a row in the lock registry table (`xt.lock` by default)
//!   keyed the same way, for deployments behind a pooled gateway where native
//!   advisory locks would not stay attached to one client.
//!
//! The backend is resolved once when the [`LockContext`] is built and shared
//! by every lock created from it.
//!
//! # Acquisition
//!
//! `acquire` issues one atomic try-lock. When it is refused, ownership is
//! re-read to tell "this session already holds it" (success) from "someone
//! else holds it" (failure naming the holder). Nothing waits or retries.
//!
//! # Release
//!
//! Dropping a [`RecordLock`] releases it. If release fails during drop a
//! warning is logged but the program does not crash.

mod backend;
mod context;
mod mode;
mod operations;
mod record;
mod report;
pub mod strategy;
mod types;


// Re-export public API
pub use backend::{probe_registry, resolve_backend};
pub use context::LockContext;
pub use mode::AcquireMode;
pub use operations::{clear_lock, install_registry, list_locks};
pub use record::{NO_SESSION_MESSAGE, NO_TARGET_MESSAGE, RecordLock};
pub use report::{ErrorReporter, LogPresenter, Presenter, Severity, StandardErrorReporter};
pub use strategy::{AdvisoryStrategy, LockStrategy, RegistryStrategy};
pub use types::{LockBackend, LockInfo, LockTarget, Ownership};

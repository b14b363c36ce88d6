//! Recordlock: application-level record locking on PostgreSQL.
//!
//! Concurrent clients, each with its own database session, agree on which of
//! them may edit a business record. A [`locks::RecordLock`] takes the lock for
//! one (table, record id) pair through either native advisory locks or the
//! `xt.lock` registry table, whichever the database provides, and gives it
//! back when released or dropped.

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod exit_codes;
pub mod locks;
pub mod script;

#[cfg(test)]
pub(crate) mod test_support;

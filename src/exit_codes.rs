//! Exit code constants for the recordlock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, unsupported operation)
//! - 2: Backend failure (connection, query, permission)
//! - 3: Lock failure (record is locked by another session)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or an operation the
/// active backend cannot perform.
pub const USER_ERROR: i32 = 1;

/// Backend failure: the database call itself failed.
pub const BACKEND_FAILURE: i32 = 2;

/// Lock failure: the record lock could not be acquired.
pub const LOCK_FAILURE: i32 = 3;

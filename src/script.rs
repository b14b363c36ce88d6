//! Scripting bridge for record locks.
//!
//! Embedded scripts drive a [`RecordLock`] through dynamically typed calls:
//! a method name plus JSON arguments. Every method maps onto one coordinator
//! operation; argument conversion is the only thing done here.

use crate::locks::{AcquireMode, LockContext, RecordLock};
use serde_json::{Value, json};
use thiserror::Error;

/// A call the bridge could not map onto the coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("{method} does not take {count} argument(s)")]
    WrongArgumentCount { method: String, count: usize },

    #[error("argument {index} of {method} must be {expected}")]
    BadArgument {
        method: String,
        index: usize,
        expected: &'static str,
    },

    #[error("unknown method '{0}'")]
    UnknownMethod(String),
}

/// Named constants published to scripts.
pub fn constants() -> Value {
    json!({
        "Silent": AcquireMode::Silent.as_i64(),
        "Interactive": AcquireMode::Interactive.as_i64(),
    })
}

/// A record lock as seen by a script.
#[derive(Debug)]
pub struct ScriptRecordLock {
    lock: RecordLock,
}

impl ScriptRecordLock {
    /// Script constructor: no arguments, or `(table, id)`.
    pub fn construct(ctx: &LockContext, args: &[Value]) -> Result<Self, ScriptError> {
        let lock = match args {
            [] => ctx.record_lock(),
            [_, _] => {
                let table = text_arg("RecordLock", args, 0)?;
                let id = id_arg("RecordLock", args, 1)?;
                ctx.record_lock_for(table, id)
            }
            _ => {
                return Err(ScriptError::WrongArgumentCount {
                    method: "RecordLock".to_string(),
                    count: args.len(),
                });
            }
        };
        Ok(Self { lock })
    }

    pub fn inner(&self) -> &RecordLock {
        &self.lock
    }

    /// Dispatch a script method call.
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value, ScriptError> {
        match method {
            "acquire" => self.acquire(args),
            "holdsLock" => {
                no_args(method, args)?;
                Ok(Value::Bool(self.lock.holds_lock()))
            }
            "isLockedOut" => {
                no_args(method, args)?;
                Ok(Value::Bool(self.lock.is_locked_out()))
            }
            "release" => {
                no_args(method, args)?;
                Ok(Value::Bool(self.lock.release()))
            }
            "lastError" => {
                no_args(method, args)?;
                Ok(Value::String(self.lock.last_error().to_string()))
            }
            "toString" => {
                no_args(method, args)?;
                Ok(Value::String(self.lock.to_string()))
            }
            other => Err(ScriptError::UnknownMethod(other.to_string())),
        }
    }

    /// `acquire()`, `acquire(mode)`, `acquire(table, id)` or
    /// `acquire(table, id, mode)`.
    fn acquire(&mut self, args: &[Value]) -> Result<Value, ScriptError> {
        const METHOD: &str = "acquire";
        let acquired = match args.len() {
            0 => self.lock.acquire(AcquireMode::default()),
            1 => self.lock.acquire(mode_arg(METHOD, args, 0)?),
            2 | 3 => {
                let table = text_arg(METHOD, args, 0)?;
                let id = id_arg(METHOD, args, 1)?;
                let mode = if args.len() == 3 {
                    mode_arg(METHOD, args, 2)?
                } else {
                    AcquireMode::default()
                };
                self.lock.acquire_target(table, id, mode)
            }
            count => {
                return Err(ScriptError::WrongArgumentCount {
                    method: METHOD.to_string(),
                    count,
                });
            }
        };
        Ok(Value::Bool(acquired))
    }
}

fn no_args(method: &str, args: &[Value]) -> Result<(), ScriptError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ScriptError::WrongArgumentCount {
            method: method.to_string(),
            count: args.len(),
        })
    }
}

fn bad(method: &str, index: usize, expected: &'static str) -> ScriptError {
    ScriptError::BadArgument {
        method: method.to_string(),
        index,
        expected,
    }
}

fn text_arg<'a>(method: &str, args: &'a [Value], index: usize) -> Result<&'a str, ScriptError> {
    args[index]
        .as_str()
        .ok_or_else(|| bad(method, index, "a table name"))
}

fn id_arg(method: &str, args: &[Value], index: usize) -> Result<i32, ScriptError> {
    args[index]
        .as_i64()
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| bad(method, index, "an integer record id"))
}

fn mode_arg(method: &str, args: &[Value], index: usize) -> Result<AcquireMode, ScriptError> {
    args[index]
        .as_i64()
        .and_then(AcquireMode::from_i64)
        .ok_or_else(|| bad(method, index, "Silent or Interactive"))
}

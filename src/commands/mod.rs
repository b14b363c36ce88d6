//! Command implementations for recordlock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every command except `clear` without `--force` opens one
//! database session and resolves the lock backend on it.

use crate::cli::{ClearArgs, Cli, Command, HoldArgs, RegistryAction, TargetArgs};
use crate::config::Config;
use crate::db::{PgSession, Session};
use crate::error::{RecordLockError, Result};
use crate::locks::{self, AcquireMode, LockContext, LockInfo, Presenter, RecordLock};
use std::cell::RefCell;
use std::io::BufRead;
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Shows lock conflicts on the terminal.
struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn critical(&self, title: &str, message: &str) {
        eprintln!("{}: {}", title, message);
    }
}

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Configuration is
/// loaded first; each command is then routed to its handler function.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config, cli.database_url)?;

    match cli.command {
        Command::Backend => cmd_backend(&config),
        Command::Status(args) => cmd_status(&config, args),
        Command::List => cmd_list(&config),
        Command::Hold(args) => cmd_hold(&config, args),
        Command::Clear(args) => cmd_clear(&config, args),
        Command::Registry(cmd) => match cmd.action {
            RegistryAction::Install => cmd_registry_install(&config),
        },
    }
}

/// Load the config file if present, then apply the command line override.
fn load_config(path: &Path, database_url: Option<String>) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        debug!(path = %path.display(), "no config file, using defaults");
        Config::default()
    };

    if let Some(url) = database_url {
        config.database_url = url;
    }
    config.validate()?;
    Ok(config)
}

fn connect(config: &Config) -> Result<PgSession> {
    Ok(PgSession::connect(
        &config.database_url,
        &config.session_application_name(),
    )?)
}

fn open_context(config: &Config) -> Result<LockContext> {
    let session: Rc<RefCell<dyn Session>> = Rc::new(RefCell::new(connect(config)?));
    Ok(LockContext::resolve(session, config)?.with_presenter(TerminalPresenter))
}

fn cmd_backend(config: &Config) -> Result<()> {
    let ctx = open_context(config)?;
    println!("{}", ctx.backend());
    Ok(())
}

fn cmd_status(config: &Config, args: TargetArgs) -> Result<()> {
    require_target(&args)?;
    let ctx = open_context(config)?;

    let mut lock = ctx.record_lock_for(&args.table, args.id);
    let locked_out = lock.is_locked_out();
    if !lock.last_error().is_empty() {
        return Err(RecordLockError::LockError(lock.last_error().to_string()));
    }

    if locked_out {
        println!("{} {}: locked by {}", args.table, args.id, lock.holder());
    } else {
        println!("{} {}: free", args.table, args.id);
    }
    Ok(())
}

fn cmd_list(config: &Config) -> Result<()> {
    let ctx = open_context(config)?;
    let locks = locks::list_locks(&ctx)?;

    if locks.is_empty() {
        println!("No active record locks.");
        return Ok(());
    }

    println!("Active record locks ({}, {} backend):", locks.len(), ctx.backend());
    println!();

    for lock in &locks {
        print_lock(lock, "  ");
        println!();
    }

    Ok(())
}

fn cmd_hold(config: &Config, args: HoldArgs) -> Result<()> {
    require_target(&args.target)?;
    let mode = if args.silent {
        AcquireMode::Silent
    } else {
        config.acquire_mode
    };

    let ctx = open_context(config)?;
    let mut lock = ctx.record_lock_for(&args.target.table, args.target.id);

    if !lock.acquire(mode) {
        return Err(acquire_failure(&lock, mode));
    }

    println!(
        "Holding lock on {} {}. Press Enter to release.",
        args.target.table, args.target.id
    );
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| RecordLockError::UserError(format!("failed to read stdin: {}", e)))?;

    if !lock.release() {
        return Err(RecordLockError::LockError(lock.last_error().to_string()));
    }
    println!("Released lock on {} {}.", args.target.table, args.target.id);
    Ok(())
}

/// Error for a refused acquisition. In interactive mode the presenter has
/// already shown the reason, so the error only states the outcome.
fn acquire_failure(lock: &RecordLock, mode: AcquireMode) -> RecordLockError {
    if mode.is_interactive() || lock.last_error().is_empty() {
        RecordLockError::LockError(format!(
            "no lock taken on {} {}",
            lock.table(),
            lock.id()
        ))
    } else {
        RecordLockError::LockError(lock.last_error().to_string())
    }
}

fn cmd_clear(config: &Config, args: ClearArgs) -> Result<()> {
    // Require --force flag
    if !args.force {
        return Err(RecordLockError::UserError(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing a lock lets another session edit the record while its holder may still be editing it.\n\
             Only clear locks if you are certain the holder has gone away.\n\n\
             To clear the lock, run:\n  recordlock clear {} {} --force",
            args.target.table, args.target.id
        )));
    }

    let ctx = open_context(config)?;
    let cleared = locks::clear_lock(&ctx, &args.target.table, args.target.id)?;

    println!("Cleared lock: {} {}", cleared.table, cleared.record_id);
    println!();
    println!("Lock details:");
    print_lock(&cleared, "  ");
    Ok(())
}

fn cmd_registry_install(config: &Config) -> Result<()> {
    let mut session = connect(config)?;
    locks::install_registry(&mut session, config)?;
    session.close()?;

    println!(
        "Installed lock registry {}.{}",
        config.registry_schema, config.registry_table
    );
    Ok(())
}

fn require_target(args: &TargetArgs) -> Result<()> {
    if args.table.is_empty() || args.id < 0 {
        return Err(RecordLockError::UserError(
            locks::NO_TARGET_MESSAGE.to_string(),
        ));
    }
    Ok(())
}

fn print_lock(lock: &LockInfo, indent: &str) {
    println!("{}{} {}:", indent, lock.table, lock.record_id);
    println!("{}  Holder:     {}", indent, lock.holder);
    if let Some(pid) = lock.holder_pid {
        println!("{}  PID:        {}", indent, pid);
    }
    if let Some(app) = &lock.application_name {
        println!("{}  Client:     {}", indent, app);
    }
    if let Some(since) = lock.since {
        println!("{}  Since:      {}", indent, since.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(age) = lock.age_string() {
        println!("{}  Age:        {}", indent, age);
    }
    if lock.held_by_me {
        println!("{}  Status:     held by this session", indent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes;
    use crate::test_support::FakeServer;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn target(table: &str, id: i32) -> TargetArgs {
        TargetArgs {
            table: table.to_string(),
            id,
        }
    }

    #[test]
    fn clear_refuses_without_force() {
        let args = ClearArgs {
            target: target("item", 42),
            force: false,
        };
        let result = cmd_clear(&Config::default(), args);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(err.to_string().contains("--force"));
        assert!(err.to_string().contains("recordlock clear item 42 --force"));
    }

    #[test]
    fn status_rejects_invalid_target() {
        let result = cmd_status(&Config::default(), target("item", -1));
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(err.to_string().contains(locks::NO_TARGET_MESSAGE));
    }

    #[test]
    fn hold_rejects_invalid_target() {
        let args = HoldArgs {
            target: target("", 3),
            silent: true,
        };
        let err = cmd_hold(&Config::default(), args).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn acquire_failure_is_reported_once() {
        let server = FakeServer::new();
        let alice = server.client("alice");
        let bob = server.client("bob");

        let mut mine = alice.ctx.record_lock_for("item", 42);
        assert!(mine.acquire(AcquireMode::Silent));

        let mut theirs = bob.ctx.record_lock_for("item", 42);
        assert!(!theirs.acquire(AcquireMode::Silent));

        let silent = acquire_failure(&theirs, AcquireMode::Silent).to_string();
        assert!(silent.contains("locked by alice"));

        let interactive = acquire_failure(&theirs, AcquireMode::Interactive).to_string();
        assert!(!interactive.contains("alice"));
        assert!(interactive.contains("no lock taken on item 42"));
        assert_eq!(
            acquire_failure(&theirs, AcquireMode::Interactive).exit_code(),
            exit_codes::LOCK_FAILURE
        );
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("recordlock.yaml"), None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_config_applies_database_url_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "database_url: postgres://file/erp").unwrap();
        writeln!(file, "lock_backend: registry").unwrap();

        let config = load_config(file.path(), None).unwrap();
        assert_eq!(config.database_url, "postgres://file/erp");

        let config =
            load_config(file.path(), Some("postgres://flag/erp".to_string())).unwrap();
        assert_eq!(config.database_url, "postgres://flag/erp");
    }

    #[test]
    fn load_config_rejects_empty_override() {
        let dir = TempDir::new().unwrap();
        let err = load_config(&dir.path().join("none.yaml"), Some(String::new())).unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn load_config_reports_bad_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "lock_backend: [not, a, backend]").unwrap();
        let err = load_config(file.path(), None).unwrap_err();
        assert!(err.to_string().contains("failed to parse config YAML"));
    }
}

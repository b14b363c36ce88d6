//! CLI argument parsing for recordlock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Recordlock: application-level record locks on PostgreSQL.
///
/// Locks are keyed by (table, record id) and held either as native advisory
/// locks or as rows in the lock registry table, whichever the database
/// provides.
#[derive(Parser, Debug)]
#[command(name = "recordlock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "recordlock.yaml")]
    pub config: PathBuf,

    /// Database URL, overriding the configuration file.
    #[arg(long, global = true, env = "RECORDLOCK_DATABASE_URL")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for recordlock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show which lock backend this database uses.
    Backend,

    /// Show who holds the lock on a record.
    Status(TargetArgs),

    /// List all record locks currently held.
    List,

    /// Take a record lock and hold it until Enter is pressed.
    Hold(HoldArgs),

    /// Remove another session's lock (registry backend only).
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(ClearArgs),

    /// Lock registry management.
    Registry(RegistryCommand),
}

/// A record, identified by table name and id.
#[derive(Parser, Debug)]
pub struct TargetArgs {
    /// Table name (e.g., item).
    pub table: String,

    /// Record id.
    pub id: i32,
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Do not show lock conflicts on the terminal; only the exit code reports them.
    #[arg(long)]
    pub silent: bool,
}

/// Arguments for the `clear` command.
#[derive(Parser, Debug)]
pub struct ClearArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Force clearing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

/// Registry subcommands.
#[derive(Parser, Debug)]
pub struct RegistryCommand {
    #[command(subcommand)]
    pub action: RegistryAction,
}

/// Available registry actions.
#[derive(Subcommand, Debug)]
pub enum RegistryAction {
    /// Create the registry schema, table, and trylock function.
    Install,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

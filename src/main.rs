//! Recordlock: application-level record locks on PostgreSQL.
//!
//! This is the main entry point for the `recordlock` CLI. It installs the log
//! subscriber, parses arguments, dispatches to the appropriate command
//! handler, and handles errors with proper exit codes.

use recordlock::cli::Cli;
use recordlock::{commands, exit_codes};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

//! # Monolithic Builder CLI
//!
//! This is the binary entry point for the `monolithic-builder` command-line
//! tool.
//!
//! Its primary responsibilities are:
//! - Routing `MONOLITHIC_COMMAND` to a subcommand and parsing arguments using
//!   `clap`.
//! - Executing the selected pipeline.
//! - Translating failures into exit codes: 1 for errors, 130 for cancelled
//!   runs (usage errors exit with 2 from `clap`).
//!
//! The core application logic is defined in the `lib.rs` library crate, ensuring
//! that the binary is a thin wrapper around the reusable library functionality.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use log::{error, LevelFilter};
use monolithic_builder::cancel::EXIT_CODE_CANCELLED;
use monolithic_builder::error::Error;

fn main() -> ExitCode {
    cli::clear_empty_env();
    let args = cli::route_args(std::env::args_os(), std::env::var(cli::COMMAND_ENV).ok());
    let cli = cli::Cli::parse_from(args);

    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cancelled = err
                .chain()
                .any(|cause| cause.downcast_ref::<Error>().is_some_and(Error::is_cancelled));
            if cancelled {
                report("Run cancelled");
                ExitCode::from(EXIT_CODE_CANCELLED as u8)
            } else {
                report(&format!("{:#}", err));
                ExitCode::FAILURE
            }
        }
    }
}

/// Logs a fatal error, falling back to stderr when logging never started.
fn report(message: &str) {
    if log::max_level() == LevelFilter::Off {
        eprintln!("Error: {}", message);
    } else {
        error!("{}", message);
    }
}

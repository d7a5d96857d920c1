//! CLI argument parsing and command dispatch

use std::env;
use std::ffi::OsString;

use anyhow::{anyhow, Result};
use clap::{CommandFactory, Parser, Subcommand};
use log::{warn, LevelFilter};
use monolithic_builder::cancel::CancellationToken;

use crate::commands;

/// Environment variable that selects the subcommand when none is given.
pub const COMMAND_ENV: &str = "MONOLITHIC_COMMAND";

/// Monolithic builder - build, push and index container images in one task
#[derive(Parser, Debug)]
#[command(name = "monolithic-builder")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        env = "BUILDER_LOG_LEVEL",
        default_value = "info"
    )]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone the source, build the image with buildah and push it
    BuildContainer(commands::build_container::BuildContainerArgs),

    /// Publish a multi-architecture image index from pushed images
    BuildImageIndex(commands::build_image_index::BuildImageIndexArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level)?;

        let cancel = CancellationToken::new();
        if let Err(e) = cancel.install_signal_handler() {
            warn!("Could not install signal handler: {}", e);
        }

        match self.command {
            Commands::BuildContainer(args) => commands::build_container::execute(args, &cancel),
            Commands::BuildImageIndex(args) => commands::build_image_index::execute(args, &cancel),
        }
    }
}

/// Installs the `env_logger` backend at `level`, writing to stderr.
fn init_logging(level: &str) -> Result<()> {
    let filter: LevelFilter = level
        .parse()
        .map_err(|_| anyhow!("Invalid log level: {}", level))?;

    // A second initialisation only happens in tests and is harmless.
    let _ = env_logger::Builder::new()
        .filter_level(filter)
        .format_timestamp_secs()
        .try_init();
    Ok(())
}

/// Inserts the subcommand named by `MONOLITHIC_COMMAND` when the caller did
/// not name one, so pipeline steps can select it through the environment.
pub fn route_args<I>(args: I, routed: Option<String>) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().collect();
    let Some(command) = routed.filter(|c| !c.is_empty()) else {
        return args;
    };

    let already_named = args
        .get(1)
        .and_then(|a| a.to_str())
        .is_some_and(is_subcommand);
    if !already_named {
        let at = args.len().min(1);
        args.insert(at, OsString::from(command));
    }
    args
}

fn is_subcommand(name: &str) -> bool {
    Cli::command()
        .get_subcommands()
        .any(|s| s.get_name() == name)
}

/// Removes empty environment variables the CLI reads.
///
/// Pipeline parameters default to the empty string; an empty variable must
/// behave like an unset one so the documented defaults apply.
pub fn clear_empty_env() {
    let cmd = Cli::command();
    let names: Vec<OsString> = cmd
        .get_arguments()
        .chain(cmd.get_subcommands().flat_map(|s| s.get_arguments()))
        .filter_map(|a| a.get_env().map(|e| e.to_os_string()))
        .chain(std::iter::once(OsString::from(COMMAND_ENV)))
        .collect();

    for name in names {
        if env::var_os(&name).is_some_and(|v| v.is_empty()) {
            env::remove_var(&name);
        }
    }
}

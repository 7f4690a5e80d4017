//! The `rusty_vault_migrate::cli` module is used to serve the `rvault-migrate` application.
//! This module accepts options from the command line and the config file, and runs a migration.

use clap::{Parser, Subcommand};
use sysexits::ExitCode;

use crate::{cli::command::CommandExecutor, EXIT_CODE_INSUFFICIENT_PARAMS, VERSION};

pub mod command;
pub mod config;

#[derive(Parser)]
#[command(
    name = "rvault-migrate",
    version = VERSION,
    disable_help_subcommand = true,
    about = "Moves secrets out of the encrypted storage of a sealed Vault and into a running Vault."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    Migrate(command::migrate::Migrate),
    Extract(command::extract::Extract),
}

impl Commands {
    pub fn execute(&mut self) -> ExitCode {
        match self {
            Commands::Migrate(migrate) => migrate.execute(),
            Commands::Extract(extract) => extract.execute(),
        }
    }
}

impl Cli {
    /// Do real jobs.
    #[inline]
    pub fn run(&mut self) -> ExitCode {
        if let Some(ref mut cmd) = &mut self.command {
            return cmd.execute();
        }

        EXIT_CODE_INSUFFICIENT_PARAMS
    }
}

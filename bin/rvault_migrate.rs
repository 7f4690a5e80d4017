use std::process::ExitCode;

use clap::Parser;
use rusty_vault_migrate::cli::Cli;

fn main() -> ExitCode {
    let mut cli = Cli::parse();
    cli.run().into()
}

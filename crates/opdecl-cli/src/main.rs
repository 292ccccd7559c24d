//! opdecl CLI: the `opdecl` command.

mod cli;
mod commands;
mod manifest;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            manifest,
            config,
            json,
            verbose,
        } => {
            support::init_tracing(verbose);
            commands::check::run(manifest, config, json)
        }

        Commands::Snapshot {
            manifest,
            config,
            json,
        } => {
            support::init_tracing(false);
            commands::snapshot::run(manifest, config, json)
        }
    }
}

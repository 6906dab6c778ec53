//! Lifecheck CLI: the `lifecheck` command.

mod cli;
mod commands;
mod config;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    support::init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            target,
            alias,
            image,
            package,
            allow_destructive,
            json,
        } => commands::run::run(commands::run::Args {
            target,
            alias,
            image,
            package,
            allow_destructive,
            json,
        }),

        Commands::Parity {
            target,
            identifiers,
            json,
        } => commands::parity::run(target, identifiers, json),

        Commands::ShortId { uuid } => commands::short_id::run(uuid),
    }
}

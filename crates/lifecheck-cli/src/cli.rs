use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lifecheck",
    about = "Lifecycle verification for an instance-management CLI",
    version
)]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// How to reach the managed CLI.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Config file (defaults to ./lifecheck.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Managed CLI program (overrides `[cli] program`)
    #[arg(long = "cli", value_name = "PROGRAM")]
    pub program: Option<String>,

    /// Argument placed before every command (repeatable; replaces `[cli] args`)
    #[arg(long = "cli-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub cli_args: Vec<String>,

    /// Kill any invocation that runs longer than this
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full instance lifecycle scenario (creates and deletes instances)
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Instance alias
        #[arg(long)]
        alias: Option<String>,

        /// Image passed to `create`
        #[arg(long)]
        image: Option<String>,

        /// Package passed to `create`
        #[arg(long)]
        package: Option<String>,

        /// Permit destructive actions against the managed account
        #[arg(long)]
        allow_destructive: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect one instance by several identifiers concurrently and require
    /// identical records
    Parity {
        #[command(flatten)]
        target: TargetArgs,

        /// Identifiers to resolve (alias, full id, short id, ...)
        #[arg(required = true)]
        identifiers: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the short form of an instance UUID
    ShortId {
        /// Full instance UUID
        uuid: String,
    },
}

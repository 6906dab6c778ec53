//! `lifecheck-sim`: a stand-in for the managed instance CLI.

use clap::Parser;
use lifecheck_sim::{SimCli, execute};
use std::io::Write;

fn main() {
    let cli = SimCli::parse();
    let output = execute(&cli);
    print!("{}", output.stdout);
    eprint!("{}", output.stderr);
    let _ = std::io::stdout().flush();
    std::process::exit(output.code);
}

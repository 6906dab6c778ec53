//! A deterministic stand-in for the managed instance CLI.
//!
//! Instances live in a JSON state file, so separate invocations (and
//! concurrent read-only ones) observe one consistent world. `--fault`
//! options let tests provoke each gate and parse failure on demand.

pub mod args;
pub mod exec;
pub mod state;

pub use args::{Fault, FaultKind, SimCli, SimCommand, Transition};
pub use exec::{SimOutput, execute};
pub use state::{SimError, SimInstance, SimState};

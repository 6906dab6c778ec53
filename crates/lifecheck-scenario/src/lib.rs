//! Lifecycle scenario orchestration.
//!
//! Sequences invocations of the managed CLI through a [`Runner`], threads an
//! explicit [`ScenarioContext`] from step to step, and returns a
//! [`ScenarioReport`] that always covers every step.
//!
//! [`Runner`]: lifecheck_runner::Runner
//! [`ScenarioReport`]: lifecheck_kernel::ScenarioReport

pub mod context;
pub mod lifecycle;
pub mod parity;

#[cfg(test)]
mod testing;

pub use context::{IdChanged, ScenarioContext, ScenarioPlan};
pub use lifecycle::{Lifecycle, SCENARIO_NAME, Step, run_lifecycle};
pub use parity::{Disagreement, ParityError, ParityResult, check_identity_resolution};

//! # lifecheck kernel
//!
//! Pure building blocks for verifying the observable lifecycle of a
//! remote-instance CLI. A lifecycle step is judged in layers:
//!
//! ```text
//! Invocation        ← argv handed to the managed CLI
//!     │
//! CapturedResult    ← stdout / stderr / process error, as bytes
//!     │
//! GateReport        ← no error, empty stderr, non-empty stdout
//!     │
//! output::*         ← line-JSON and pattern parsing
//!     │
//! InstanceRecord    ← typed {id, alias, state} with a closed state enum
//!     │
//! StepReport        ← failures with deterministic witness ids
//! ```
//!
//! The kernel never spawns processes. Runners and orchestrators live in
//! `lifecheck-runner` and `lifecheck-scenario`.

pub mod capture;
pub mod error;
pub mod gate;
pub mod output;
pub mod record;
pub mod report;
pub mod witness;

pub use capture::{CapturedResult, Invocation, ProcessError};
pub use error::{FailureClass, OutputError};
pub use gate::{GateCheck, GateOutcome, GateReport};
pub use output::Pattern;
pub use record::{InstanceRecord, InstanceState, uuid_to_short_id};
pub use report::{ScenarioReport, StepReport, StepStatus, Verdict};
pub use witness::{StepFailure, compute_witness_id};

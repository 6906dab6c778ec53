//! The assertion gate.
//!
//! Every invocation must pass three independent checks before the step that
//! issued it may look at its output:
//!
//! - no process error (spawn, exit status, timeout)
//! - nothing written to stderr
//! - something written to stdout
//!
//! All three are evaluated and reported even when an earlier one fails.
//! Only a fully passing gate lets the step continue.

use crate::capture::{CapturedResult, Invocation};
use crate::error::FailureClass;
use crate::witness::StepFailure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCheck {
    NoError,
    EmptyStderr,
    StdoutPresent,
}

impl GateCheck {
    /// Evaluation order.
    pub const ALL: [GateCheck; 3] = [Self::NoError, Self::EmptyStderr, Self::StdoutPresent];

    pub fn name(self) -> &'static str {
        match self {
            Self::NoError => "no_error",
            Self::EmptyStderr => "empty_stderr",
            Self::StdoutPresent => "stdout_present",
        }
    }

    pub fn class(self) -> FailureClass {
        match self {
            Self::NoError => FailureClass::ProcessFailure,
            Self::EmptyStderr => FailureClass::UnexpectedStderr,
            Self::StdoutPresent => FailureClass::EmptyOutput,
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Self::NoError => "no error",
            Self::EmptyStderr => "empty stderr",
            Self::StdoutPresent => "non-empty stdout",
        }
    }
}

/// Outcome of a single gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub check: GateCheck,
    pub passed: bool,
    /// The literal offending value when the check failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

/// Gate verdict for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub command: String,
    pub outcomes: Vec<GateOutcome>,
}

impl GateReport {
    pub fn evaluate(invocation: &Invocation, captured: &CapturedResult) -> Self {
        let outcomes = GateCheck::ALL
            .into_iter()
            .map(|check| {
                let actual = match check {
                    GateCheck::NoError => captured.error.as_ref().map(ToString::to_string),
                    GateCheck::EmptyStderr => {
                        (!captured.stderr.is_empty()).then(|| captured.stderr_text().into_owned())
                    }
                    GateCheck::StdoutPresent => {
                        captured.stdout.is_empty().then(|| "<empty>".to_string())
                    }
                };
                GateOutcome {
                    check,
                    passed: actual.is_none(),
                    actual,
                }
            })
            .collect();

        Self {
            command: invocation.command_line(),
            outcomes,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.passed)
    }

    /// One failure per failed check, attributed to `step`.
    pub fn failures(&self, step: &str) -> Vec<StepFailure> {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.passed)
            .map(|outcome| {
                let actual = outcome.actual.clone().unwrap_or_default();
                StepFailure::mismatch(
                    outcome.check.class(),
                    step,
                    outcome.check.name(),
                    outcome.check.expected(),
                    actual.trim_end(),
                )
                .with_details(serde_json::json!({ "command": self.command }))
            })
            .collect()
    }
}

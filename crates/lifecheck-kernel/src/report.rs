//! Step and scenario reports.

use crate::error::{FailureClass, OutputError};
use crate::gate::GateReport;
use crate::witness::StepFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// The result of one scenario step. Produced on every path, including gate
/// and parse failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub status: StepStatus,
    pub commands: Vec<String>,
    pub gates: Vec<GateReport>,
    pub failures: Vec<StepFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub duration_ms: u64,
}

impl StepReport {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: StepStatus::Passed,
            commands: Vec::new(),
            gates: Vec::new(),
            failures: Vec::new(),
            skip_reason: None,
            duration_ms: 0,
        }
    }

    /// A step that never ran.
    pub fn skipped(step: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut report = Self::new(step);
        report.status = StepStatus::Skipped;
        report.skip_reason = Some(reason.into());
        report
    }

    /// Record a gate verdict. Returns whether the step may continue.
    pub fn record_gate(&mut self, gate: GateReport) -> bool {
        let passed = gate.passed();
        self.commands.push(gate.command.clone());
        self.failures.extend(gate.failures(&self.step));
        self.gates.push(gate);
        self.refresh_status();
        passed
    }

    pub fn record_failure(&mut self, failure: StepFailure) {
        self.failures.push(failure);
        self.refresh_status();
    }

    pub fn record_output_error(&mut self, err: &OutputError) {
        let failure = StepFailure::from_output_error(self.step.clone(), err);
        self.record_failure(failure);
    }

    /// Record a mismatch when `expected != actual`. Returns whether they
    /// matched.
    pub fn check_eq(
        &mut self,
        class: FailureClass,
        check: &str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> bool {
        let expected = expected.to_string();
        let actual = actual.to_string();
        if expected == actual {
            return true;
        }
        let failure = StepFailure::mismatch(class, self.step.clone(), check, expected, actual);
        self.record_failure(failure);
        false
    }

    pub fn finish(mut self, elapsed: Duration) -> Self {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.refresh_status();
        self
    }

    fn refresh_status(&mut self) {
        if self.status == StepStatus::Skipped {
            return;
        }
        self.status = if self.failures.is_empty() {
            StepStatus::Passed
        } else {
            StepStatus::Failed
        };
    }

    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
}

/// Everything a scenario run observed, in step order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub verdict: Verdict,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    pub fn new(
        scenario: impl Into<String>,
        started_at: DateTime<Utc>,
        steps: Vec<StepReport>,
    ) -> Self {
        let verdict = if steps.iter().all(|step| step.status == StepStatus::Passed) {
            Verdict::Passed
        } else {
            Verdict::Failed
        };
        Self {
            scenario: scenario.into(),
            verdict,
            started_at,
            finished_at: Utc::now(),
            steps,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepFailure> {
        self.steps.iter().flat_map(|step| step.failures.iter())
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|step| step.step == name)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|step| step.status == status).count()
    }
}

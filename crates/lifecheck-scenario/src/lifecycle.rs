//! The instance lifecycle scenario.
//!
//! A fixed, linear sequence of CLI invocations:
//!
//! ```text
//! create -wjn ─▶ instance -j ×3 (parallel) ─▶ delete -w
//!     ─▶ create -jn ─▶ wait ─▶ stop -w ─▶ instance -j (stopped)
//!     ─▶ start -w ─▶ instance -j (running) ─▶ delete -w
//! ```
//!
//! Every step yields a [`StepReport`]. Failed assertions are recorded and
//! the scenario moves on; a step that needs an instance id no earlier step
//! produced is reported as skipped.

use crate::context::{ScenarioContext, ScenarioPlan};
use crate::parity::check_identity_resolution;
use lifecheck_kernel::output::{
    Pattern, expect_line_count, parse_record, parse_record_lines, split_lines,
};
use lifecheck_kernel::{
    CapturedResult, FailureClass, GateReport, InstanceRecord, InstanceState, Invocation,
    ScenarioReport, StepFailure, StepReport, StepStatus, uuid_to_short_id,
};
use lifecheck_runner::Runner;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub const SCENARIO_NAME: &str = "instance_lifecycle";

const WAIT_FIRST_LINE_SUFFIX: &str = "(states: running, failed)";
const WAIT_SECOND_LINE_SUFFIX: &str = "moved to state running";
const STOP_PREFIX: &str = "Stop instance";
const START_PREFIX: &str = "Start instance";

/// Steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateBlocking,
    InspectParity,
    Delete,
    CreateAsync,
    Wait,
    Stop,
    ConfirmStopped,
    Start,
    ConfirmRunning,
    CleanupDelete,
}

impl Step {
    pub const ALL: [Step; 10] = [
        Self::CreateBlocking,
        Self::InspectParity,
        Self::Delete,
        Self::CreateAsync,
        Self::Wait,
        Self::Stop,
        Self::ConfirmStopped,
        Self::Start,
        Self::ConfirmRunning,
        Self::CleanupDelete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::CreateBlocking => "create_blocking",
            Self::InspectParity => "inspect_parity",
            Self::Delete => "delete",
            Self::CreateAsync => "create_async",
            Self::Wait => "wait",
            Self::Stop => "stop",
            Self::ConfirmStopped => "confirm_stopped",
            Self::Start => "start",
            Self::ConfirmRunning => "confirm_running",
            Self::CleanupDelete => "cleanup_delete",
        }
    }
}

/// Drives the lifecycle scenario against one runner.
pub struct Lifecycle {
    runner: Arc<dyn Runner>,
    context: ScenarioContext,
}

impl Lifecycle {
    pub fn new(runner: Arc<dyn Runner>, plan: ScenarioPlan) -> Self {
        Self {
            runner,
            context: ScenarioContext::new(plan),
        }
    }

    /// Run every step in order and collect their reports.
    pub async fn run(mut self) -> ScenarioReport {
        let started_at = chrono::Utc::now();
        let mut steps = Vec::with_capacity(Step::ALL.len());
        for step in Step::ALL {
            steps.push(self.run_step(step).await);
        }
        let report = ScenarioReport::new(SCENARIO_NAME, started_at, steps);
        info!(verdict = ?report.verdict, "scenario finished");
        report
    }

    async fn run_step(&mut self, step: Step) -> StepReport {
        let started = Instant::now();
        info!(step = step.name(), "step started");
        let report = match step {
            Step::CreateBlocking => self.create_blocking().await,
            Step::InspectParity => self.inspect_parity().await,
            Step::Delete | Step::CleanupDelete => self.delete(step).await,
            Step::CreateAsync => self.create_async().await,
            Step::Wait => self.wait().await,
            Step::Stop => self.transition(step, "stop", STOP_PREFIX).await,
            Step::Start => self.transition(step, "start", START_PREFIX).await,
            Step::ConfirmStopped => self.confirm(step, InstanceState::Stopped).await,
            Step::ConfirmRunning => self.confirm(step, InstanceState::Running).await,
        };
        let report = report.finish(started.elapsed());
        match report.status {
            StepStatus::Passed => info!(step = step.name(), "step passed"),
            StepStatus::Skipped => warn!(
                step = step.name(),
                reason = report.skip_reason.as_deref().unwrap_or_default(),
                "step skipped"
            ),
            StepStatus::Failed => {
                for failure in &report.failures {
                    warn!(step = step.name(), class = %failure.class, "{}", failure.message);
                }
            }
        }
        report
    }

    /// Run one invocation through the gate. Output is handed back only when
    /// the gate passed.
    async fn invoke(&self, report: &mut StepReport, args: Vec<String>) -> Option<CapturedResult> {
        let invocation = Invocation::new(args);
        info!(step = %report.step, command = %invocation.command_line(), "running");
        let captured = self.runner.run(&invocation).await;
        let gate = GateReport::evaluate(&invocation, &captured);
        report.record_gate(gate).then_some(captured)
    }

    fn require_id(&self, step: Step) -> Result<Uuid, StepReport> {
        self.context.instance_id().ok_or_else(|| {
            StepReport::skipped(step.name(), "no instance id observed by an earlier step")
        })
    }

    fn create_args(&self, flags: &str) -> Vec<String> {
        let plan = self.context.plan();
        vec![
            "create".to_string(),
            flags.to_string(),
            plan.alias.clone(),
            plan.image.clone(),
            plan.package.clone(),
        ]
    }

    async fn create_blocking(&mut self) -> StepReport {
        let mut report = StepReport::new(Step::CreateBlocking.name());
        let Some(captured) = self.invoke(&mut report, self.create_args("-wjn")).await else {
            return report;
        };
        match parse_record_lines(&captured.stdout, 2) {
            Ok(mut records) => {
                let finished = records.pop();
                let initial = records.pop();
                if let (Some(initial), Some(finished)) = (initial, finished) {
                    report.check_eq(FailureClass::StateMismatch, "id", initial.id, finished.id);
                    report.check_eq(
                        FailureClass::StateMismatch,
                        "state",
                        InstanceState::Running,
                        finished.state,
                    );
                    self.context.establish(finished);
                }
            }
            Err(err) => report.record_output_error(&err),
        }
        report
    }

    async fn inspect_parity(&mut self) -> StepReport {
        let step = Step::InspectParity;
        let Some(record) = self.context.instance().cloned() else {
            return StepReport::skipped(
                step.name(),
                "no instance record observed by an earlier step",
            );
        };
        let id = record.id.to_string();
        let identifiers = vec![
            self.context.plan().alias.clone(),
            id.clone(),
            uuid_to_short_id(&id).to_string(),
        ];

        let mut report = StepReport::new(step.name());
        match check_identity_resolution(Arc::clone(&self.runner), &identifiers).await {
            Ok(result) => {
                for gate in result.gates {
                    report.record_gate(gate);
                }
                if let Some(first) = result.records.into_iter().next() {
                    self.observe(&mut report, first);
                }
            }
            Err(err) => err.record(&mut report),
        }
        report
    }

    async fn delete(&mut self, step: Step) -> StepReport {
        let id = match self.require_id(step) {
            Ok(id) => id,
            Err(skipped) => return skipped,
        };
        let mut report = StepReport::new(step.name());
        let args = vec!["delete".to_string(), "-w".to_string(), id.to_string()];
        if self.invoke(&mut report, args).await.is_some() {
            self.context.clear();
        }
        report
    }

    async fn create_async(&mut self) -> StepReport {
        let mut report = StepReport::new(Step::CreateAsync.name());
        let Some(captured) = self.invoke(&mut report, self.create_args("-jn")).await else {
            return report;
        };
        match parse_record_lines(&captured.stdout, 1) {
            Ok(mut records) => {
                if let Some(record) = records.pop() {
                    report.check_eq(
                        FailureClass::StateMismatch,
                        "state",
                        InstanceState::Provisioning,
                        record.state,
                    );
                    self.context.establish(record);
                }
            }
            Err(err) => report.record_output_error(&err),
        }
        report
    }

    async fn wait(&mut self) -> StepReport {
        let id = match self.require_id(Step::Wait) {
            Ok(id) => id,
            Err(skipped) => return skipped,
        };
        let mut report = StepReport::new(Step::Wait.name());
        let args = vec!["wait".to_string(), id.to_string()];
        let Some(captured) = self.invoke(&mut report, args).await else {
            return report;
        };

        let lines = split_lines(&captured.stdout);
        if let Err(err) = expect_line_count(&lines, 2) {
            report.record_output_error(&err);
            return report;
        }
        check_pattern(
            &mut report,
            "first_line",
            &Pattern::suffix(WAIT_FIRST_LINE_SUFFIX),
            &lines[0],
        );
        check_pattern(
            &mut report,
            "second_line",
            &Pattern::suffix(WAIT_SECOND_LINE_SUFFIX),
            &lines[1],
        );
        report
    }

    /// `stop -w <alias>` / `start -w <alias>`.
    async fn transition(&mut self, step: Step, verb: &str, prefix: &str) -> StepReport {
        if self.context.instance().is_none() {
            return StepReport::skipped(step.name(), "no instance under test");
        }
        let mut report = StepReport::new(step.name());
        let args = vec![
            verb.to_string(),
            "-w".to_string(),
            self.context.plan().alias.clone(),
        ];
        let Some(captured) = self.invoke(&mut report, args).await else {
            return report;
        };
        let stdout = captured.stdout_text();
        check_pattern(&mut report, "message", &Pattern::prefix(prefix), &stdout);
        report
    }

    /// `instance -j <alias>` and require `expected` state.
    async fn confirm(&mut self, step: Step, expected: InstanceState) -> StepReport {
        if self.context.instance().is_none() {
            return StepReport::skipped(step.name(), "no instance under test");
        }
        let mut report = StepReport::new(step.name());
        let args = vec![
            "instance".to_string(),
            "-j".to_string(),
            self.context.plan().alias.clone(),
        ];
        let Some(captured) = self.invoke(&mut report, args).await else {
            return report;
        };
        match parse_record(&captured.stdout) {
            Ok(record) => {
                report.check_eq(FailureClass::StateMismatch, "state", expected, record.state);
                self.observe(&mut report, record);
            }
            Err(err) => report.record_output_error(&err),
        }
        report
    }

    /// Adopt a fresher record, reporting an id change instead of adopting it.
    fn observe(&mut self, report: &mut StepReport, record: InstanceRecord) {
        if let Err(changed) = self.context.observe(record) {
            report.record_failure(StepFailure::mismatch(
                FailureClass::StateMismatch,
                report.step.clone(),
                "id",
                changed.held.to_string(),
                changed.observed.to_string(),
            ));
        }
    }
}

fn check_pattern(report: &mut StepReport, check: &str, pattern: &Pattern, text: &str) {
    if pattern.is_match(text) {
        return;
    }
    let failure = StepFailure::mismatch(
        FailureClass::PatternMismatch,
        report.step.clone(),
        check,
        format!("text matching /{}/", pattern.as_str()),
        text.trim_end(),
    );
    report.record_failure(failure);
}

/// Run the lifecycle scenario with `plan` against `runner`.
pub async fn run_lifecycle(runner: Arc<dyn Runner>, plan: ScenarioPlan) -> ScenarioReport {
    Lifecycle::new(runner, plan).run().await
}

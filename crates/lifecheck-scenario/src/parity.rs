//! Parallel identity-resolution check.
//!
//! The same instance is inspected once per identifier form (alias, full
//! id, short id) concurrently. Every branch must pass its gate, every
//! stdout must decode, and every decoded record must equal the first.

use lifecheck_kernel::output::parse_record;
use lifecheck_kernel::{
    CapturedResult, FailureClass, GateReport, InstanceRecord, Invocation, OutputError,
    StepFailure, StepReport,
};
use lifecheck_runner::Runner;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Records resolved from each identifier, in identifier order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParityResult {
    pub identifiers: Vec<String>,
    pub records: Vec<InstanceRecord>,
    pub gates: Vec<GateReport>,
}

/// An identifier whose record differs from the reference one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disagreement {
    pub identifier: String,
    pub record: InstanceRecord,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ParityError {
    #[error("inspect by `{identifier}` failed its gate")]
    Branch { identifier: String, gate: GateReport },

    #[error("inspect task did not complete: {message}")]
    Join { message: String },

    #[error("inspect by `{identifier}` returned malformed output: {error}")]
    Malformed {
        identifier: String,
        error: OutputError,
    },

    #[error("{} identifier(s) resolved differently from `{reference}`", .disagreements.len())]
    Mismatch {
        reference: String,
        expected: Box<InstanceRecord>,
        disagreements: Vec<Disagreement>,
    },
}

impl ParityError {
    /// Record this error against `report`.
    ///
    /// Branch and join errors are `fan_in_error`; disagreement is
    /// `fan_in_mismatch`; undecodable output stays `malformed_output`.
    pub fn record(self, report: &mut StepReport) {
        let step = report.step.clone();
        match self {
            ParityError::Branch { identifier, gate } => {
                let command = gate.command.clone();
                report.record_gate(gate);
                report.record_failure(
                    StepFailure::new(
                        FailureClass::FanInError,
                        step,
                        "fan_in",
                        format!("branch `{identifier}` failed; fan-in aborted"),
                    )
                    .with_details(json!({ "identifier": identifier, "command": command })),
                );
            }
            ParityError::Join { message } => {
                report.record_failure(StepFailure::new(
                    FailureClass::FanInError,
                    step,
                    "fan_in",
                    format!("branch task failed: {message}"),
                ));
            }
            ParityError::Malformed { identifier, error } => {
                report.record_failure(
                    StepFailure::from_output_error(step, &error)
                        .with_details(json!({ "identifier": identifier })),
                );
            }
            ParityError::Mismatch {
                reference,
                expected,
                disagreements,
            } => {
                let expected_json = serde_json::to_string(&expected).unwrap_or_default();
                for disagreement in disagreements {
                    let actual_json =
                        serde_json::to_string(&disagreement.record).unwrap_or_default();
                    report.record_failure(
                        StepFailure::new(
                            FailureClass::FanInMismatch,
                            step.clone(),
                            "same_record",
                            format!(
                                "record for `{}` differs from record for `{reference}`",
                                disagreement.identifier
                            ),
                        )
                        .with_actual(actual_json)
                        .with_details(json!({
                            "identifier": disagreement.identifier,
                            "reference": reference,
                            "expected": expected_json,
                        })),
                    );
                }
            }
        }
    }
}

/// Inspect the instance by every identifier concurrently and require the
/// same record back from each.
///
/// Fan-in waits for all branches. The first branch to fail aborts the
/// fan-in; its siblings are detached and left to finish on their own.
pub async fn check_identity_resolution(
    runner: Arc<dyn Runner>,
    identifiers: &[String],
) -> Result<ParityResult, ParityError> {
    let mut set = JoinSet::new();
    for (index, identifier) in identifiers.iter().enumerate() {
        let runner = Arc::clone(&runner);
        let invocation = Invocation::new(["instance", "-j", identifier.as_str()]);
        set.spawn(async move {
            let captured = runner.run(&invocation).await;
            let gate = GateReport::evaluate(&invocation, &captured);
            (index, gate, captured)
        });
    }
    debug!(branches = identifiers.len(), "identity fan-out");

    let mut branches: Vec<Option<(GateReport, CapturedResult)>> =
        (0..identifiers.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        let (index, gate, captured) = match joined {
            Ok(branch) => branch,
            Err(err) => {
                warn!(error = %err, "identity branch task failed");
                set.detach_all();
                return Err(ParityError::Join {
                    message: err.to_string(),
                });
            }
        };
        if !gate.passed() {
            warn!(identifier = %identifiers[index], "identity branch failed its gate");
            set.detach_all();
            return Err(ParityError::Branch {
                identifier: identifiers[index].clone(),
                gate,
            });
        }
        branches[index] = Some((gate, captured));
    }

    let mut gates = Vec::with_capacity(branches.len());
    let mut records = Vec::with_capacity(branches.len());
    for (identifier, branch) in identifiers.iter().zip(branches) {
        let Some((gate, captured)) = branch else {
            return Err(ParityError::Join {
                message: format!("no result for `{identifier}`"),
            });
        };
        let record = parse_record(&captured.stdout).map_err(|error| ParityError::Malformed {
            identifier: identifier.clone(),
            error,
        })?;
        gates.push(gate);
        records.push(record);
    }

    if let Some(first) = records.first() {
        let disagreements: Vec<Disagreement> = identifiers
            .iter()
            .zip(&records)
            .skip(1)
            .filter(|(_, record)| *record != first)
            .map(|(identifier, record)| Disagreement {
                identifier: identifier.clone(),
                record: record.clone(),
            })
            .collect();
        if !disagreements.is_empty() {
            return Err(ParityError::Mismatch {
                reference: identifiers[0].clone(),
                expected: Box::new(first.clone()),
                disagreements,
            });
        }
    }

    Ok(ParityResult {
        identifiers: identifiers.to_vec(),
        records,
        gates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ALIAS, ID, SHORT, ScriptedRunner, record_json};
    use lifecheck_kernel::StepStatus;

    fn identifiers() -> Vec<String> {
        vec![ALIAS.to_string(), ID.to_string(), SHORT.to_string()]
    }

    fn runner_with(alias: &str, id: &str, short: &str) -> Arc<ScriptedRunner> {
        Arc::new(
            ScriptedRunner::new()
                .stdout("instance -j vm1", alias)
                .stdout(&format!("instance -j {ID}"), id)
                .stdout(&format!("instance -j {SHORT}"), short),
        )
    }

    #[tokio::test]
    async fn identical_records_pass() {
        let json = record_json(ID, "running");
        let runner = runner_with(&json, &json, &json);
        let result = check_identity_resolution(runner.clone(), &identifiers())
            .await
            .unwrap();
        assert_eq!(result.records.len(), 3);
        assert_eq!(result.identifiers, identifiers());
        assert!(result.gates.iter().all(GateReport::passed));
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn differing_record_is_a_mismatch() {
        let running = record_json(ID, "running");
        let stopped = record_json(ID, "stopped");
        let runner = runner_with(&running, &running, &stopped);
        let err = check_identity_resolution(runner, &identifiers())
            .await
            .unwrap_err();
        let ParityError::Mismatch {
            reference,
            disagreements,
            ..
        } = &err
        else {
            panic!("expected mismatch, got {err:?}");
        };
        assert_eq!(reference, ALIAS);
        assert_eq!(disagreements.len(), 1);
        assert_eq!(disagreements[0].identifier, SHORT);

        let mut report = StepReport::new("inspect_parity");
        err.record(&mut report);
        assert_eq!(report.status, StepStatus::Failed);
        assert_eq!(report.failures[0].class, FailureClass::FanInMismatch);
    }

    #[tokio::test]
    async fn failing_branch_aborts_fan_in() {
        let json = record_json(ID, "running");
        let runner = Arc::new(
            ScriptedRunner::new()
                .stdout("instance -j vm1", &json)
                .stdout(&format!("instance -j {ID}"), &json)
                .on(
                    &format!("instance -j {SHORT}"),
                    CapturedResult::from_stdout(json.clone()).with_stderr("warning: slow"),
                ),
        );
        let err = check_identity_resolution(runner, &identifiers())
            .await
            .unwrap_err();
        assert!(matches!(&err, ParityError::Branch { identifier, .. } if identifier == SHORT));

        let mut report = StepReport::new("inspect_parity");
        err.record(&mut report);
        let classes: Vec<_> = report.failures.iter().map(|f| f.class).collect();
        assert_eq!(
            classes,
            vec![FailureClass::UnexpectedStderr, FailureClass::FanInError]
        );
    }

    #[tokio::test]
    async fn undecodable_branch_is_malformed_not_mismatch() {
        let json = record_json(ID, "running");
        let runner = runner_with(&json, "not json", &json);
        let err = check_identity_resolution(runner, &identifiers())
            .await
            .unwrap_err();
        assert!(matches!(&err, ParityError::Malformed { identifier, .. } if identifier == ID));

        let mut report = StepReport::new("inspect_parity");
        err.record(&mut report);
        assert_eq!(report.failures[0].class, FailureClass::MalformedOutput);
        assert_eq!(report.failures[0].check, "json_parse");
    }

    #[tokio::test]
    async fn no_identifiers_is_trivially_consistent() {
        let runner = Arc::new(ScriptedRunner::new());
        let result = check_identity_resolution(runner, &[]).await.unwrap();
        assert!(result.records.is_empty());
    }
}

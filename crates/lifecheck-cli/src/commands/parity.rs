use crate::cli::TargetArgs;
use crate::support::{print_json, print_step, runtime_or_exit, target_settings_or_exit};
use lifecheck_kernel::StepReport;
use lifecheck_scenario::check_identity_resolution;
use serde_json::json;
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const STEP_NAME: &str = "identity_parity";

pub fn run(target: TargetArgs, identifiers: Vec<String>, json_output: bool) {
    let settings = target_settings_or_exit(target);
    debug!(cli = %settings.target_line(), identifiers = identifiers.len(), "parity check");
    let runner = Arc::new(settings.runner());
    let started = Instant::now();
    let outcome = runtime_or_exit().block_on(check_identity_resolution(runner, &identifiers));

    match outcome {
        Ok(result) => {
            if json_output {
                print_json(&json!({
                    "consistent": true,
                    "identifiers": result.identifiers,
                    "record": result.records.first(),
                }));
            } else {
                println!("lifecheck parity {}", identifiers.join(" "));
                println!("  Target: {}", settings.target_line());
                if let Some(record) = result.records.first() {
                    println!("  Instance: {} ({})", record.id, record.state);
                }
                println!("  Consistent: yes");
            }
        }
        Err(err) => {
            let mut report = StepReport::new(STEP_NAME);
            err.record(&mut report);
            let report = report.finish(started.elapsed());
            if json_output {
                print_json(&json!({
                    "consistent": false,
                    "identifiers": identifiers,
                    "report": report,
                }));
            } else {
                println!("lifecheck parity {}", identifiers.join(" "));
                println!("  Target: {}", settings.target_line());
                print_step(&report);
                println!("  Consistent: no");
            }
            process::exit(1);
        }
    }
}

use crate::cli::TargetArgs;
use crate::config::{FileConfig, Overrides, Settings};
use lifecheck_kernel::{ScenarioReport, StepFailure, StepReport, StepStatus};
use serde::Serialize;
use std::process;
use tracing_subscriber::EnvFilter;

/// Exit status for configuration and usage errors.
pub const EXIT_USAGE: i32 = 2;

pub fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn settings_or_exit(config: Option<&std::path::Path>, overrides: Overrides) -> Settings {
    FileConfig::load(config)
        .and_then(|file| Settings::resolve(file, overrides))
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(EXIT_USAGE);
        })
}

pub fn target_settings_or_exit(target: TargetArgs) -> Settings {
    let config = target.config.clone();
    settings_or_exit(config.as_deref(), Overrides::from(target))
}

pub fn runtime_or_exit() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        })
}

pub fn print_json<T: Serialize>(payload: &T) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: failed to render JSON: {e}");
            process::exit(1);
        }
    }
}

pub fn print_report(report: &ScenarioReport, target: &str) {
    println!("lifecheck run {}", report.scenario);
    println!("  Target: {target}");
    println!(
        "  Steps: {} (passed {}, failed {}, skipped {})",
        report.steps.len(),
        report.count(StepStatus::Passed),
        report.count(StepStatus::Failed),
        report.count(StepStatus::Skipped),
    );
    for step in &report.steps {
        print_step(step);
    }
    println!(
        "  Verdict: {}",
        if report.passed() { "passed" } else { "failed" }
    );
}

pub fn print_step(step: &StepReport) {
    match step.status {
        StepStatus::Passed => println!("  [pass] {} ({} ms)", step.step, step.duration_ms),
        StepStatus::Skipped => println!(
            "  [skip] {}: {}",
            step.step,
            step.skip_reason.as_deref().unwrap_or("no reason recorded")
        ),
        StepStatus::Failed => {
            println!("  [FAIL] {} ({} ms)", step.step, step.duration_ms);
            for failure in &step.failures {
                println!("    - {}", failure_line(failure));
            }
        }
    }
}

/// `class check: message [witness]`, where the message already carries
/// "expected X, got Y" for value mismatches.
pub fn failure_line(failure: &StepFailure) -> String {
    format!(
        "{} {}: {} [{}]",
        failure.class, failure.check, failure.message, failure.witness_id
    )
}

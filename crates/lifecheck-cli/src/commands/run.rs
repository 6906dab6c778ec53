use crate::cli::TargetArgs;
use crate::config::Overrides;
use crate::support::{print_json, print_report, runtime_or_exit, settings_or_exit};
use lifecheck_scenario::{SCENARIO_NAME, run_lifecycle};
use serde_json::json;
use std::process;
use std::sync::Arc;
use tracing::info;

pub struct Args {
    pub target: TargetArgs,
    pub alias: Option<String>,
    pub image: Option<String>,
    pub package: Option<String>,
    pub allow_destructive: bool,
    pub json: bool,
}

const SKIP_REASON: &str =
    "destructive actions are not allowed; pass --allow-destructive or set destructive_allowed = true";

pub fn run(args: Args) {
    let config = args.target.config.clone();
    let overrides = Overrides {
        alias: args.alias,
        image: args.image,
        package: args.package,
        allow_destructive: args.allow_destructive,
        ..Overrides::from(args.target)
    };
    let settings = settings_or_exit(config.as_deref(), overrides);

    if !settings.destructive_allowed {
        eprintln!("skip: {SCENARIO_NAME}: {SKIP_REASON}");
        if args.json {
            print_json(&json!({
                "scenario": SCENARIO_NAME,
                "verdict": "skipped",
                "skip_reason": SKIP_REASON,
            }));
        }
        return;
    }

    info!(cli = %settings.target_line(), alias = %settings.plan.alias, "running lifecycle");
    let runner = Arc::new(settings.runner());
    let report = runtime_or_exit().block_on(run_lifecycle(runner, settings.plan.clone()));

    if args.json {
        print_json(&report);
    } else {
        print_report(&report, &settings.target_line());
    }
    if !report.passed() {
        process::exit(1);
    }
}

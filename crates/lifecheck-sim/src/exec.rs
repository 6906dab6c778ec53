//! Command execution against the state file.

use crate::args::{Fault, FaultKind, SimCli, SimCommand, Transition};
use crate::state::{SimError, SimInstance, SimState};
use chrono::Utc;
use lifecheck_kernel::InstanceState;
use std::path::Path;
use uuid::Uuid;

/// What the process should write and exit with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl SimOutput {
    fn line(&mut self, text: impl AsRef<str>) {
        self.stdout.push_str(text.as_ref());
        self.stdout.push('\n');
    }

    fn error(command: &str, err: impl std::fmt::Display) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("lifecheck-sim {command}: error: {err}\n"),
            code: 1,
        }
    }
}

/// Run one parsed command and report its output.
pub fn execute(cli: &SimCli) -> SimOutput {
    let command = cli.command.name();
    let fault = cli
        .faults
        .iter()
        .rev()
        .find(|fault| fault.command == command);

    if matches!(fault, Some(Fault { kind: FaultKind::Exit, .. })) {
        return SimOutput::error(command, "simulated failure");
    }

    let mut output = match run(&cli.state, &cli.command) {
        Ok(output) => output,
        Err(err) => return SimOutput::error(command, err),
    };

    match fault.map(|fault| fault.kind) {
        Some(FaultKind::Stderr) => {
            output
                .stderr
                .push_str(&format!("warning: simulated fault for `{command}`\n"));
        }
        Some(FaultKind::Garbage) => output.stdout = "%% not json %%\n".to_string(),
        Some(FaultKind::Empty) => output.stdout.clear(),
        Some(FaultKind::Exit) | None => {}
    }
    output
}

fn run(path: &Path, command: &SimCommand) -> Result<SimOutput, SimError> {
    let mut state = SimState::load(path)?;
    let mut out = SimOutput::default();
    let dirty = match command {
        SimCommand::Create {
            wait,
            json,
            name,
            image,
            package,
        } => {
            create(&mut state, &mut out, *wait, *json, name, image, package)?;
            true
        }
        SimCommand::Instance { json, identifier } => {
            let inst = &state.instances[state.resolve(identifier)?];
            if *json {
                out.line(inst.to_record().to_string());
            } else {
                out.line(serde_json::to_string_pretty(&inst.to_record()).unwrap_or_default());
            }
            false
        }
        SimCommand::Wait { identifier } => {
            let idx = state.resolve(identifier)?;
            let inst = &mut state.instances[idx];
            let short = inst.short_id();
            let target = match inst.state {
                InstanceState::Provisioning | InstanceState::Running => InstanceState::Running,
                InstanceState::Failed => InstanceState::Failed,
                other => return Err(SimError::NotWaitable { short, state: other }),
            };
            out.line(format!(
                "Waiting for instance {short} ({}) to reach a terminal state (states: running, failed)",
                inst.alias
            ));
            inst.state = target;
            out.line(format!(
                "Instance {short} ({}) moved to state {target}",
                inst.alias
            ));
            true
        }
        SimCommand::Stop(t) => {
            transition(&mut state, &mut out, t, "Stop", InstanceState::Stopped)?;
            true
        }
        SimCommand::Start(t) => {
            transition(&mut state, &mut out, t, "Start", InstanceState::Running)?;
            true
        }
        SimCommand::Delete(t) => {
            let idx = state.resolve(&t.identifier)?;
            let inst = state.instances.remove(idx);
            out.line(progress("Delete", t.wait, &inst));
            true
        }
    };
    if dirty {
        state.save(path)?;
    }
    Ok(out)
}

fn create(
    state: &mut SimState,
    out: &mut SimOutput,
    wait: bool,
    json: bool,
    alias: &str,
    image: &str,
    package: &str,
) -> Result<(), SimError> {
    if state.alias_in_use(alias) {
        return Err(SimError::AliasTaken(alias.to_string()));
    }
    let mut inst = SimInstance {
        id: Uuid::new_v4(),
        alias: alias.to_string(),
        state: InstanceState::Provisioning,
        image: image.to_string(),
        package: package.to_string(),
        created: Utc::now(),
    };
    if json {
        out.line(inst.to_record().to_string());
    } else {
        out.line(format!(
            "Creating instance {} ({}, {image}, {package})",
            inst.alias,
            inst.short_id()
        ));
    }
    if wait {
        inst.state = InstanceState::Running;
        if json {
            out.line(inst.to_record().to_string());
        } else {
            out.line(format!("Created instance {}", inst.label()));
        }
    }
    state.instances.push(inst);
    Ok(())
}

fn transition(
    state: &mut SimState,
    out: &mut SimOutput,
    t: &Transition,
    verb: &str,
    target: InstanceState,
) -> Result<(), SimError> {
    let idx = state.resolve(&t.identifier)?;
    let inst = &mut state.instances[idx];
    inst.state = target;
    out.line(progress(verb, t.wait, inst));
    Ok(())
}

fn progress(verb: &str, wait: bool, inst: &SimInstance) -> String {
    if wait {
        format!("{verb} instance {}", inst.label())
    } else {
        format!("{verb} (async) instance {}", inst.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use lifecheck_kernel::output::{parse_record, parse_record_lines};
    use lifecheck_kernel::uuid_to_short_id;
    use std::path::PathBuf;

    struct TempState {
        dir: PathBuf,
    }

    impl TempState {
        fn new(label: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "lifecheck-sim-{label}-{}-{}",
                std::process::id(),
                Uuid::new_v4()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self { dir }
        }

        fn path(&self) -> PathBuf {
            self.dir.join("state.json")
        }

        fn sim(&self, args: &[&str]) -> SimOutput {
            let state = format!("--state={}", self.path().display());
            let argv = ["lifecheck-sim", state.as_str()]
                .into_iter()
                .chain(args.iter().copied());
            execute(&SimCli::try_parse_from(argv).unwrap())
        }
    }

    impl Drop for TempState {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn create_running(state: &TempState) -> String {
        let out = state.sim(&["create", "-wjn", "vm1", "img", "pkg"]);
        assert_eq!(out.code, 0, "{}", out.stderr);
        let records = parse_record_lines(out.stdout.as_bytes(), 2).unwrap();
        records[0].id.to_string()
    }

    #[test]
    fn blocking_create_prints_both_records() {
        let state = TempState::new("create");
        let out = state.sim(&["create", "-wjn", "vm1", "img", "pkg"]);
        assert_eq!(out.code, 0);
        assert!(out.stderr.is_empty());
        let records = parse_record_lines(out.stdout.as_bytes(), 2).unwrap();
        assert_eq!(records[0].id, records[1].id);
        assert_eq!(records[0].state, InstanceState::Provisioning);
        assert_eq!(records[1].state, InstanceState::Running);
        assert_eq!(records[1].alias.as_deref(), Some("vm1"));
    }

    #[test]
    fn every_identifier_form_resolves_to_the_same_record() {
        let state = TempState::new("resolve");
        let id = create_running(&state);
        let short = uuid_to_short_id(&id).to_string();

        let outputs: Vec<_> = ["vm1", id.as_str(), short.as_str()]
            .into_iter()
            .map(|ident| state.sim(&["instance", "-j", ident]))
            .collect();
        for out in &outputs {
            assert_eq!(out.code, 0, "{}", out.stderr);
        }
        let first = parse_record(outputs[0].stdout.as_bytes()).unwrap();
        for out in &outputs[1..] {
            assert_eq!(parse_record(out.stdout.as_bytes()).unwrap(), first);
        }
    }

    #[test]
    fn unknown_identifier_fails_on_stderr() {
        let state = TempState::new("unknown");
        let out = state.sim(&["instance", "-j", "nope"]);
        assert_eq!(out.code, 1);
        assert!(out.stdout.is_empty());
        assert!(out.stderr.contains("no instance found matching \"nope\""));
    }

    #[test]
    fn async_create_then_wait_reaches_running() {
        let state = TempState::new("wait");
        let out = state.sim(&["create", "-jn", "vm1", "img", "pkg"]);
        let record = parse_record_lines(out.stdout.as_bytes(), 1).unwrap().remove(0);
        assert_eq!(record.state, InstanceState::Provisioning);

        let id = record.id.to_string();
        let out = state.sim(&["wait", id.as_str()]);
        assert_eq!(out.code, 0);
        let lines: Vec<_> = out.stdout.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("(states: running, failed)"));
        assert!(lines[1].ends_with("moved to state running"));
        assert!(lines[1].starts_with(&format!("Instance {} (vm1)", record.short_id())));

        let shown = state.sim(&["instance", "-j", "vm1"]);
        let shown = parse_record(shown.stdout.as_bytes()).unwrap();
        assert_eq!(shown.state, InstanceState::Running);
    }

    #[test]
    fn stop_start_delete_mutate_state() {
        let state = TempState::new("transitions");
        let id = create_running(&state);

        let out = state.sim(&["stop", "-w", "vm1"]);
        assert!(out.stdout.starts_with("Stop instance vm1 ("));
        let shown = parse_record(state.sim(&["instance", "-j", "vm1"]).stdout.as_bytes()).unwrap();
        assert_eq!(shown.state, InstanceState::Stopped);

        let out = state.sim(&["start", "vm1"]);
        assert!(out.stdout.starts_with("Start (async) instance vm1 ("));

        let out = state.sim(&["delete", "-w", id.as_str()]);
        assert!(out.stdout.starts_with("Delete instance vm1 ("));
        assert_eq!(state.sim(&["instance", "-j", id.as_str()]).code, 1);
    }

    #[test]
    fn alias_must_be_unique() {
        let state = TempState::new("alias");
        create_running(&state);
        let out = state.sim(&["create", "-wjn", "vm1", "img", "pkg"]);
        assert_eq!(out.code, 1);
        assert!(out.stderr.contains("already exists"));
    }

    #[test]
    fn faults_shape_the_output() {
        let state = TempState::new("faults");
        create_running(&state);

        let out = state.sim(&["--fault=instance=stderr", "instance", "-j", "vm1"]);
        assert_eq!(out.code, 0);
        assert!(out.stderr.contains("simulated fault"));
        assert!(parse_record(out.stdout.as_bytes()).is_ok());

        let out = state.sim(&["--fault=instance=garbage", "instance", "-j", "vm1"]);
        assert!(parse_record(out.stdout.as_bytes()).is_err());

        let out = state.sim(&["--fault=instance=empty", "instance", "-j", "vm1"]);
        assert!(out.stdout.is_empty());

        let out = state.sim(&["--fault=stop=exit", "stop", "-w", "vm1"]);
        assert_eq!(out.code, 1);
        let shown = parse_record(state.sim(&["instance", "-j", "vm1"]).stdout.as_bytes()).unwrap();
        assert_eq!(shown.state, InstanceState::Running);
    }

    #[test]
    fn stopped_instance_is_not_waitable() {
        let state = TempState::new("not-waitable");
        create_running(&state);
        state.sim(&["stop", "-w", "vm1"]);
        let out = state.sim(&["wait", "vm1"]);
        assert_eq!(out.code, 1);
        assert!(out.stderr.contains("nothing to wait for"));
    }
}

//! A scripted runner for orchestrator tests.

use async_trait::async_trait;
use lifecheck_kernel::{CapturedResult, Invocation, ProcessError};
use lifecheck_runner::Runner;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const ID: &str = "b1a2c3d4-5e6f-4a0b-8c1d-2e3f4a5b6c7d";
pub const SHORT: &str = "b1a2c3d4";
pub const OTHER_ID: &str = "0f0e0d0c-1111-4222-8333-944455556666";
pub const ALIAS: &str = "vm1";

pub fn record_json(id: &str, state: &str) -> String {
    format!(r#"{{"id":"{id}","alias":"{ALIAS}","state":"{state}","package":"t4-standard-128M"}}"#)
}

/// Answers each command line with queued results, in order.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, VecDeque<CapturedResult>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, command_line: &str, result: CapturedResult) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(command_line.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn stdout(self, command_line: &str, stdout: &str) -> Self {
        self.on(command_line, CapturedResult::from_stdout(stdout))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Script a full clean lifecycle for instance [`ID`] under alias [`ALIAS`].
    pub fn happy_path() -> Self {
        let inspect_running = record_json(ID, "running");
        Self::new()
            .stdout(
                "create -wjn vm1 base-64@15.2.0 t4-standard-128M",
                &format!(
                    "{}\n{}\n",
                    record_json(ID, "provisioning"),
                    record_json(ID, "running")
                ),
            )
            .stdout("instance -j vm1", &inspect_running)
            .stdout(&format!("instance -j {ID}"), &inspect_running)
            .stdout(&format!("instance -j {SHORT}"), &inspect_running)
            .stdout(&format!("delete -w {ID}"), &format!("Delete instance vm1 ({SHORT})\n"))
            .stdout(
                "create -jn vm1 base-64@15.2.0 t4-standard-128M",
                &format!("{}\n", record_json(ID, "provisioning")),
            )
            .stdout(
                &format!("wait {ID}"),
                &format!(
                    "Waiting for instance {SHORT} (vm1) to reach a terminal state (states: running, failed)\nInstance {SHORT} (vm1) moved to state running\n"
                ),
            )
            .stdout("stop -w vm1", &format!("Stop instance vm1 ({SHORT})\n"))
            .stdout("instance -j vm1", &record_json(ID, "stopped"))
            .stdout("start -w vm1", &format!("Start instance vm1 ({SHORT})\n"))
            .stdout("instance -j vm1", &inspect_running)
            .stdout(&format!("delete -w {ID}"), &format!("Delete instance vm1 ({SHORT})\n"))
    }

    /// Replace the first queued answer for `command_line`.
    pub fn replace(self, command_line: &str, result: CapturedResult) -> Self {
        self.replace_nth(command_line, 0, result)
    }

    /// Replace the `n`th queued answer for `command_line`.
    pub fn replace_nth(self, command_line: &str, n: usize, result: CapturedResult) -> Self {
        if let Some(slot) = self
            .responses
            .lock()
            .unwrap()
            .get_mut(command_line)
            .and_then(|queue| queue.get_mut(n))
        {
            *slot = result;
        }
        self
    }
}

#[async_trait]
impl Runner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> CapturedResult {
        let command_line = invocation.command_line();
        self.calls.lock().unwrap().push(command_line.clone());
        self.responses
            .lock()
            .unwrap()
            .get_mut(&command_line)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                CapturedResult::from_error(ProcessError::NonZeroExit { code: Some(127) })
                    .with_stderr(format!("unscripted command: {command_line}"))
            })
    }
}

//! Subprocess runner for the managed CLI.
//!
//! This crate is intentionally thin: it spawns the CLI once per invocation,
//! captures stdout/stderr and reports every failure inside the returned
//! [`CapturedResult`]. It holds no scenario policy.

use async_trait::async_trait;
use lifecheck_kernel::{CapturedResult, Invocation, ProcessError};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// Something that can execute an invocation of the managed CLI.
///
/// Implementations must not panic or return early without a result: every
/// failure is folded into `CapturedResult::error`.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> CapturedResult;
}

/// Runs `program prefix_args.. args..` as a fresh OS process per call.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    prefix_args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            timeout: None,
        }
    }

    /// Arguments placed before every invocation's own argv (profiles,
    /// simulator state paths).
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Bound each invocation. `None` waits for as long as the CLI blocks.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.prefix_args)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Only a timeout may cut a child short.
            .kill_on_drop(self.timeout.is_some());
        command
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> CapturedResult {
        let started = Instant::now();
        let command_line = invocation.command_line();
        debug!(program = %self.program.display(), args = %command_line, "spawning");

        let child = match self.command(invocation).spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(program = %self.program.display(), error = %err, "spawn failed");
                return CapturedResult::from_error(ProcessError::Spawn {
                    program: self.program.display().to_string(),
                    message: err.to_string(),
                })
                .with_duration(started.elapsed());
            }
        };

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!(args = %command_line, timeout_ms = limit.as_millis() as u64, "invocation timed out");
                    return CapturedResult::from_error(ProcessError::TimedOut {
                        after_ms: limit.as_millis() as u64,
                    })
                    .with_duration(started.elapsed());
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match waited {
            Ok(output) => output,
            Err(err) => {
                warn!(args = %command_line, error = %err, "failed to collect output");
                return CapturedResult::from_error(ProcessError::Io {
                    message: err.to_string(),
                })
                .with_duration(started.elapsed());
            }
        };

        let exit_code = output.status.code();
        let error = (invocation.expect_exit_ok && !output.status.success())
            .then_some(ProcessError::NonZeroExit { code: exit_code });
        let duration = started.elapsed();
        debug!(
            args = %command_line,
            exit_code = ?exit_code,
            elapsed_ms = duration.as_millis() as u64,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "invocation finished"
        );

        CapturedResult {
            stdout: output.stdout,
            stderr: output.stderr,
            error,
            exit_code,
            duration,
        }
    }
}

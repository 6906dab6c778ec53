//! Invocations and the raw results captured from them.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;

/// One argv handed to the managed CLI. Built per step and used once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub args: Vec<String>,
    pub expect_exit_ok: bool,
}

impl Invocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            expect_exit_ok: true,
        }
    }

    /// Accept a non-zero exit status instead of treating it as an error.
    pub fn allow_failure(mut self) -> Self {
        self.expect_exit_ok = false;
        self
    }

    /// The argv joined with spaces, for logs and reports.
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}

/// Why a subprocess did not complete cleanly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("process exited with {}", exit_label(.code))]
    NonZeroExit { code: Option<i32> },

    #[error("process timed out after {after_ms} ms and was killed")]
    TimedOut { after_ms: u64 },

    #[error("failed to collect process output: {message}")]
    Io { message: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Everything observed from one finished invocation.
///
/// Failures travel inside the value (`error`), never as a panic or an
/// `Err`, so a caller always gets something to report on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapturedResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub error: Option<ProcessError>,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl CapturedResult {
    /// A clean exit with the given stdout.
    pub fn from_stdout(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// A result carrying only a process error.
    pub fn from_error(error: ProcessError) -> Self {
        let exit_code = match &error {
            ProcessError::NonZeroExit { code } => *code,
            _ => None,
        };
        Self {
            error: Some(error),
            exit_code,
            ..Self::default()
        }
    }

    pub fn with_stderr(mut self, stderr: impl Into<Vec<u8>>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_defaults_to_expecting_success() {
        let inv = Invocation::new(["instance", "-j", "vm1"]);
        assert!(inv.expect_exit_ok);
        assert_eq!(inv.command_line(), "instance -j vm1");
        assert!(!inv.allow_failure().expect_exit_ok);
    }

    #[test]
    fn process_error_messages_name_the_cause() {
        let err = ProcessError::NonZeroExit { code: Some(3) };
        assert_eq!(err.to_string(), "process exited with status 3");
        let err = ProcessError::NonZeroExit { code: None };
        assert!(err.to_string().contains("signal"));
        let err = ProcessError::TimedOut { after_ms: 1500 };
        assert!(err.to_string().contains("1500 ms"));
    }

    #[test]
    fn from_error_keeps_exit_code() {
        let captured = CapturedResult::from_error(ProcessError::NonZeroExit { code: Some(1) });
        assert_eq!(captured.exit_code, Some(1));
        assert!(captured.stdout.is_empty());
    }
}

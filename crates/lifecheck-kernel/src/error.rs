//! Failure taxonomy and output-decoding errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of every failure a step can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Non-zero exit, spawn failure, or timeout.
    ProcessFailure,
    /// Something was written to stderr on a call expected to be clean.
    UnexpectedStderr,
    /// stdout was empty where output was required.
    EmptyOutput,
    /// JSON that does not parse, a wrong line count, or a record that does
    /// not decode.
    MalformedOutput,
    /// An observed field (state, id) differs from the expected value.
    StateMismatch,
    /// A progress message did not have the expected shape.
    PatternMismatch,
    /// A concurrent branch failed before fan-in completed.
    FanInError,
    /// Every concurrent branch succeeded but they disagree.
    FanInMismatch,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProcessFailure => "process_failure",
            Self::UnexpectedStderr => "unexpected_stderr",
            Self::EmptyOutput => "empty_output",
            Self::MalformedOutput => "malformed_output",
            Self::StateMismatch => "state_mismatch",
            Self::PatternMismatch => "pattern_mismatch",
            Self::FanInError => "fan_in_error",
            Self::FanInMismatch => "fan_in_mismatch",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while turning captured stdout into structured data.
///
/// All of them classify as [`FailureClass::MalformedOutput`], but the
/// line-count case carries its own check name so a wrong number of lines
/// is never reported as a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    #[error("expected {expected} line(s) of output, got {actual}")]
    LineCount { expected: usize, actual: usize },

    #[error("line {line} is not valid JSON: {message}")]
    Json { line: usize, message: String },

    #[error("record is missing field `{field}`")]
    MissingField { field: &'static str },

    #[error("record field `{field}` is invalid: {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("unknown instance state `{0}`")]
    UnknownState(String),
}

impl OutputError {
    /// Stable check name used in step reports.
    pub fn check_name(&self) -> &'static str {
        match self {
            Self::LineCount { .. } => "line_count",
            Self::Json { .. } => "json_parse",
            Self::MissingField { .. } | Self::InvalidField { .. } => "record_shape",
            Self::UnknownState(_) => "record_state",
        }
    }
}

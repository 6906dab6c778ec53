//! Parsing of captured stdout.
//!
//! Two modes are offered. Line-JSON mode treats every stdout line as an
//! independent JSON document (`create -wj` prints one record per line).
//! Pattern mode matches human-readable progress lines against a regex and
//! never fails hard: a mismatch is an assertion result, not an error.

use crate::error::OutputError;
use crate::record::InstanceRecord;
use regex::Regex;
use serde_json::Value;

/// Split stdout into lines after trimming surrounding whitespace.
///
/// Empty (or whitespace-only) output yields no lines.
pub fn split_lines(stdout: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

/// Require exactly `expected` lines.
pub fn expect_line_count(lines: &[String], expected: usize) -> Result<(), OutputError> {
    if lines.len() == expected {
        Ok(())
    } else {
        Err(OutputError::LineCount {
            expected,
            actual: lines.len(),
        })
    }
}

/// Parse every stdout line as JSON.
///
/// With `expected` set, the line count is checked before any line is
/// parsed. The first unparsable line fails the whole call.
pub fn parse_json_lines(stdout: &[u8], expected: Option<usize>) -> Result<Vec<Value>, OutputError> {
    let lines = split_lines(stdout);
    if let Some(expected) = expected {
        expect_line_count(&lines, expected)?;
    }
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            serde_json::from_str::<Value>(line).map_err(|e| OutputError::Json {
                line: idx + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Parse the whole of stdout as a single JSON document.
pub fn parse_document(stdout: &[u8]) -> Result<Value, OutputError> {
    serde_json::from_slice::<Value>(stdout).map_err(|e| OutputError::Json {
        line: e.line(),
        message: e.to_string(),
    })
}

/// Parse stdout as exactly one instance record.
pub fn parse_record(stdout: &[u8]) -> Result<InstanceRecord, OutputError> {
    InstanceRecord::from_value(&parse_document(stdout)?)
}

/// Parse stdout as `expected` line-delimited instance records.
pub fn parse_record_lines(
    stdout: &[u8],
    expected: usize,
) -> Result<Vec<InstanceRecord>, OutputError> {
    parse_json_lines(stdout, Some(expected))?
        .iter()
        .map(InstanceRecord::from_value)
        .collect()
}

/// A textual expectation on a progress message.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Text must start with `literal`.
    pub fn prefix(literal: &str) -> Self {
        Self::literal(&format!("^{}", regex::escape(literal)))
    }

    /// Text must end with `literal`.
    pub fn suffix(literal: &str) -> Self {
        Self::literal(&format!("{}$", regex::escape(literal)))
    }

    fn literal(expr: &str) -> Self {
        Self {
            regex: Regex::new(expr).expect("escaped literal is a valid regex"),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

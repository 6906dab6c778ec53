//! Step failures with deterministic witness identifiers.
//!
//! Two runs that fail the same check the same way produce the same
//! witness id, which makes reports diffable across runs.
//!
//! Algorithm:
//! 1. Build the canonical key `{schema, class, step, check, expected}`
//! 2. Serialize with sorted keys and no whitespace
//! 3. witnessId = "w1_" || base32hex_lower(SHA256(keyBytes))
//!
//! The observed (`actual`) value is deliberately not part of the key.

use crate::error::{FailureClass, OutputError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Compute a witness ID from the canonical key fields.
pub fn compute_witness_id(
    class: FailureClass,
    step: &str,
    check: &str,
    expected: Option<&str>,
) -> String {
    let key = canonical_witness_key(class, step, check, expected);
    // `Map` is ordered by key, so compact serialization is canonical.
    let bytes = serde_json::to_vec(&key).unwrap_or_default();
    format!("w1_{}", base32hex_lower(&Sha256::digest(bytes)))
}

fn canonical_witness_key(
    class: FailureClass,
    step: &str,
    check: &str,
    expected: Option<&str>,
) -> Value {
    let mut map = Map::new();
    map.insert("schema".to_string(), Value::Number(1.into()));
    map.insert("class".to_string(), Value::String(class.as_str().to_string()));
    map.insert("step".to_string(), Value::String(step.to_string()));
    map.insert("check".to_string(), Value::String(check.to_string()));
    map.insert(
        "expected".to_string(),
        expected
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
    );
    Value::Object(map)
}

/// RFC 4648 base32hex, lowercase, unpadded. Encodes 5-byte blocks into
/// 8 symbols; a short final block emits only the symbols it covers.
fn base32hex_lower(data: &[u8]) -> String {
    const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    for chunk in data.chunks(5) {
        let mut block = [0u8; 5];
        block[..chunk.len()].copy_from_slice(chunk);
        let packed = block
            .iter()
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));
        for symbol in 0..(chunk.len() * 8).div_ceil(5) {
            let index = (packed >> (35 - 5 * symbol)) & 0x1f;
            out.push(char::from(ALPHABET[index as usize]));
        }
    }
    out
}

/// One failed assertion, recorded against the step that made it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepFailure {
    pub witness_id: String,
    pub class: FailureClass,
    pub step: String,
    /// Name of the check within the step (e.g. `no_error`, `state`).
    pub check: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Literal captured value that failed the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl StepFailure {
    pub fn new(
        class: FailureClass,
        step: impl Into<String>,
        check: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let step = step.into();
        let check = check.into();
        Self {
            witness_id: compute_witness_id(class, &step, &check, None),
            class,
            step,
            check,
            message: message.into(),
            expected: None,
            actual: None,
            details: None,
        }
    }

    /// A failure of the form "expected X, got Y".
    pub fn mismatch(
        class: FailureClass,
        step: impl Into<String>,
        check: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let step = step.into();
        let check = check.into();
        let expected = expected.into();
        let actual = actual.into();
        Self {
            witness_id: compute_witness_id(class, &step, &check, Some(&expected)),
            class,
            message: format!("{check}: expected {expected}, got {actual}"),
            step,
            check,
            expected: Some(expected),
            actual: Some(actual),
            details: None,
        }
    }

    /// Map an output decoding error onto a `malformed_output` failure.
    pub fn from_output_error(step: impl Into<String>, err: &OutputError) -> Self {
        match err {
            OutputError::LineCount { expected, actual } => Self::mismatch(
                FailureClass::MalformedOutput,
                step,
                err.check_name(),
                format!("{expected} line(s)"),
                format!("{actual} line(s)"),
            ),
            _ => Self::new(
                FailureClass::MalformedOutput,
                step,
                err.check_name(),
                err.to_string(),
            ),
        }
    }

    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn witness_id_determinism() {
        let id1 = compute_witness_id(FailureClass::StateMismatch, "create", "state", Some("running"));
        let id2 = compute_witness_id(FailureClass::StateMismatch, "create", "state", Some("running"));
        assert_eq!(id1, id2);
        assert!(id1.starts_with("w1_"));
        // sha256 is 256 bits -> 52 base32 characters
        assert_eq!(id1.len(), 3 + 52);
    }

    #[test]
    fn witness_id_sensitivity() {
        let a = compute_witness_id(FailureClass::StateMismatch, "create", "state", Some("running"));
        let b = compute_witness_id(FailureClass::StateMismatch, "create", "state", Some("stopped"));
        let c = compute_witness_id(FailureClass::PatternMismatch, "create", "state", Some("running"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn actual_value_does_not_change_witness_id() {
        let a = StepFailure::mismatch(FailureClass::StateMismatch, "wait", "state", "running", "failed");
        let b = StepFailure::mismatch(FailureClass::StateMismatch, "wait", "state", "running", "provisioning");
        assert_eq!(a.witness_id, b.witness_id);
        assert_eq!(b.message, "state: expected running, got provisioning");
    }

    #[test]
    fn line_count_errors_report_expected_and_actual() {
        let err = OutputError::LineCount {
            expected: 2,
            actual: 3,
        };
        let failure = StepFailure::from_output_error("create_blocking", &err);
        assert_eq!(failure.class, FailureClass::MalformedOutput);
        assert_eq!(failure.check, "line_count");
        assert_eq!(failure.expected.as_deref(), Some("2 line(s)"));
        assert_eq!(failure.actual.as_deref(), Some("3 line(s)"));
    }

    #[test]
    fn witness_key_serializes_with_sorted_keys() {
        let key = canonical_witness_key(FailureClass::StateMismatch, "wait", "state", Some("running"));
        assert_eq!(
            serde_json::to_string(&key).unwrap(),
            r#"{"check":"state","class":"state_mismatch","expected":"running","schema":1,"step":"wait"}"#
        );
        let digest = Sha256::digest(serde_json::to_vec(&key).unwrap());
        assert_eq!(
            compute_witness_id(FailureClass::StateMismatch, "wait", "state", Some("running")),
            format!("w1_{}", base32hex_lower(&digest))
        );
    }

    #[test]
    fn base32hex_known_vector() {
        // RFC 4648 test vector: BASE32-HEX("f") = "CO" (lowercase, unpadded)
        assert_eq!(base32hex_lower(b"f"), "co");
        assert_eq!(base32hex_lower(b"foobar"), "cpnmuoj1e8");
        assert_eq!(base32hex_lower(b""), "");
    }

    #[test]
    fn serializes_camel_case() {
        let failure = StepFailure::new(FailureClass::EmptyOutput, "stop", "stdout_present", "no stdout");
        let value = serde_json::to_value(&failure).unwrap();
        assert!(value.get("witnessId").is_some());
        assert_eq!(value["class"], "empty_output");
        assert!(value.get("expected").is_none());
    }
}

//! Typed instance records as reported by the managed CLI.

use crate::error::OutputError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle states an instance may report. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Provisioning,
    Running,
    Stopping,
    Stopped,
    Deleting,
    Deleted,
    Failed,
    Offline,
}

impl InstanceState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Failed => "failed",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceState {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provisioning" => Ok(Self::Provisioning),
            "running" => Ok(Self::Running),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            "deleting" => Ok(Self::Deleting),
            "deleted" => Ok(Self::Deleted),
            "failed" => Ok(Self::Failed),
            "offline" => Ok(Self::Offline),
            other => Err(OutputError::UnknownState(other.to_string())),
        }
    }
}

/// Last-known view of a remote instance.
///
/// Fields beyond `id`, `alias` and `state` are kept verbatim in `extra` so
/// that equality is structural over the whole decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceRecord {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub state: InstanceState,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstanceRecord {
    /// Decode a JSON object emitted by the CLI.
    pub fn from_value(value: &Value) -> Result<Self, OutputError> {
        let object = value
            .as_object()
            .ok_or_else(|| OutputError::InvalidField {
                field: "<root>",
                message: "expected a JSON object".to_string(),
            })?;

        let id = match object.get("id") {
            None | Some(Value::Null) => return Err(OutputError::MissingField { field: "id" }),
            Some(Value::String(raw)) => {
                Uuid::parse_str(raw).map_err(|e| OutputError::InvalidField {
                    field: "id",
                    message: format!("`{raw}` is not a UUID: {e}"),
                })?
            }
            Some(other) => {
                return Err(OutputError::InvalidField {
                    field: "id",
                    message: format!("expected a string, got {other}"),
                });
            }
        };

        let state = match object.get("state") {
            None | Some(Value::Null) => return Err(OutputError::MissingField { field: "state" }),
            Some(Value::String(raw)) => raw.parse::<InstanceState>()?,
            Some(other) => {
                return Err(OutputError::InvalidField {
                    field: "state",
                    message: format!("expected a string, got {other}"),
                });
            }
        };

        let alias = match object.get("alias") {
            None | Some(Value::Null) => None,
            Some(Value::String(alias)) => Some(alias.clone()),
            Some(other) => {
                return Err(OutputError::InvalidField {
                    field: "alias",
                    message: format!("expected a string, got {other}"),
                });
            }
        };

        let extra = object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "id" | "alias" | "state"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            id,
            alias,
            state,
            extra,
        })
    }

    /// Short identifier derived from the full id.
    pub fn short_id(&self) -> String {
        uuid_to_short_id(&self.id.to_string()).to_string()
    }
}

/// Shorten a UUID to its first hyphen-separated group.
///
/// `"b1a2c3d4-0000-4000-8000-000000000000"` becomes `"b1a2c3d4"`. Input
/// without a hyphen is returned unchanged.
pub fn uuid_to_short_id(uuid: &str) -> &str {
    uuid.split_once('-').map_or(uuid, |(head, _)| head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID: &str = "b1a2c3d4-5e6f-4a0b-8c1d-2e3f4a5b6c7d";

    #[test]
    fn short_id_is_first_group() {
        assert_eq!(uuid_to_short_id(ID), "b1a2c3d4");
        assert_eq!(uuid_to_short_id("nohyphen"), "nohyphen");
    }

    #[test]
    fn decodes_minimal_record_and_keeps_extra_fields() {
        let value = json!({"id": ID, "alias": "vm1", "state": "running", "memory": 128});
        let record = InstanceRecord::from_value(&value).unwrap();
        assert_eq!(record.state, InstanceState::Running);
        assert_eq!(record.alias.as_deref(), Some("vm1"));
        assert_eq!(record.extra.get("memory"), Some(&json!(128)));
        assert_eq!(record.short_id(), "b1a2c3d4");
    }

    #[test]
    fn alias_is_optional() {
        let record = InstanceRecord::from_value(&json!({"id": ID, "state": "stopped"})).unwrap();
        assert_eq!(record.alias, None);
    }

    #[test]
    fn unknown_state_is_a_distinct_error() {
        let err = InstanceRecord::from_value(&json!({"id": ID, "state": "hibernating"}))
            .unwrap_err();
        assert_eq!(err, OutputError::UnknownState("hibernating".into()));
    }

    #[test]
    fn missing_and_invalid_id_are_rejected() {
        let err = InstanceRecord::from_value(&json!({"state": "running"})).unwrap_err();
        assert_eq!(err, OutputError::MissingField { field: "id" });

        let err = InstanceRecord::from_value(&json!({"id": "nope", "state": "running"}))
            .unwrap_err();
        assert!(matches!(err, OutputError::InvalidField { field: "id", .. }));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = InstanceRecord::from_value(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, OutputError::InvalidField { .. }));
    }

    #[test]
    fn serialized_record_flattens_extra() {
        let value = json!({"id": ID, "alias": "vm1", "state": "running", "image": "base"});
        let record = InstanceRecord::from_value(&value).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), value);
    }
}

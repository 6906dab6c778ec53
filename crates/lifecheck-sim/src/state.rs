//! Simulator state: every instance, persisted as one JSON document.

use chrono::{DateTime, Utc};
use lifecheck_kernel::{InstanceState, uuid_to_short_id};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("state file {path}: {message}")]
    State { path: String, message: String },

    #[error("no instance found matching \"{0}\"")]
    NotFound(String),

    #[error("\"{identifier}\" matches {count} instances")]
    Ambiguous { identifier: String, count: usize },

    #[error("an instance named \"{0}\" already exists")]
    AliasTaken(String),

    #[error("instance {short} is {state}; nothing to wait for")]
    NotWaitable { short: String, state: InstanceState },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInstance {
    pub id: Uuid,
    pub alias: String,
    pub state: InstanceState,
    pub image: String,
    pub package: String,
    pub created: DateTime<Utc>,
}

impl SimInstance {
    pub fn short_id(&self) -> String {
        uuid_to_short_id(&self.id.to_string()).to_string()
    }

    /// `alias (short)` as used in progress messages.
    pub fn label(&self) -> String {
        format!("{} ({})", self.alias, self.short_id())
    }

    /// The JSON record the real CLI would print.
    pub fn to_record(&self) -> Value {
        json!({
            "id": self.id,
            "alias": self.alias,
            "state": self.state,
            "image": self.image,
            "package": self.package,
            "created": self.created.to_rfc3339(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    #[serde(default)]
    pub instances: Vec<SimInstance>,
}

impl SimState {
    /// Load state, treating a missing file as empty.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| state_error(path, e)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(state_error(path, err)),
        }
    }

    /// Persist via a temp file and rename so concurrent readers never see a
    /// partial document.
    pub fn save(&self, path: &Path) -> Result<(), SimError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| state_error(parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| state_error(path, e))?;
        let tmp_path = tmp_write_path(path);
        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()
        })();
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(state_error(&tmp_path, err));
        }
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            state_error(path, e)
        })
    }

    /// Resolve an alias, full id, or short id to one instance index.
    pub fn resolve(&self, identifier: &str) -> Result<usize, SimError> {
        let matches: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, inst)| {
                inst.alias == identifier
                    || inst.id.to_string() == identifier
                    || inst.short_id() == identifier
            })
            .map(|(idx, _)| idx)
            .collect();
        match matches.as_slice() {
            [] => Err(SimError::NotFound(identifier.to_string())),
            [idx] => Ok(*idx),
            _ => Err(SimError::Ambiguous {
                identifier: identifier.to_string(),
                count: matches.len(),
            }),
        }
    }

    pub fn alias_in_use(&self, alias: &str) -> bool {
        self.instances.iter().any(|inst| inst.alias == alias)
    }
}

fn state_error(path: &Path, err: impl std::fmt::Display) -> SimError {
    SimError::State {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

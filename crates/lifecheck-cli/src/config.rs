//! `lifecheck.toml` loading and flag precedence.

use crate::cli::TargetArgs;
use lifecheck_runner::ProcessRunner;
use lifecheck_scenario::ScenarioPlan;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "lifecheck.toml";
pub const DEFAULT_PROGRAM: &str = "triton";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invocation timeout must be at least one second")]
    ZeroTimeout,

    #[error("managed CLI program must not be empty")]
    EmptyProgram,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub destructive_allowed: bool,
    pub invocation_timeout_secs: Option<u64>,
    pub cli: CliSection,
    pub scenario: ScenarioPlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliSection {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CliSection {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: Vec::new(),
        }
    }
}

impl FileConfig {
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given (it must exist), else `./lifecheck.toml` if
    /// present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&path, &text)
    }
}

/// Flags that override file values.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub program: Option<String>,
    pub cli_args: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub alias: Option<String>,
    pub image: Option<String>,
    pub package: Option<String>,
    pub allow_destructive: bool,
}

impl From<TargetArgs> for Overrides {
    fn from(target: TargetArgs) -> Self {
        Self {
            program: target.program,
            cli_args: target.cli_args,
            timeout_secs: target.timeout_secs,
            ..Self::default()
        }
    }
}

/// Effective settings for one invocation of `lifecheck`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub program: String,
    pub prefix_args: Vec<String>,
    pub timeout: Option<Duration>,
    pub plan: ScenarioPlan,
    pub destructive_allowed: bool,
}

impl Settings {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let program = overrides.program.unwrap_or(file.cli.program);
        if program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram);
        }
        let prefix_args = if overrides.cli_args.is_empty() {
            file.cli.args
        } else {
            overrides.cli_args
        };
        let timeout = match overrides.timeout_secs.or(file.invocation_timeout_secs) {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            secs => secs.map(Duration::from_secs),
        };
        let mut plan = file.scenario;
        if let Some(alias) = overrides.alias {
            plan.alias = alias;
        }
        if let Some(image) = overrides.image {
            plan.image = image;
        }
        if let Some(package) = overrides.package {
            plan.package = package;
        }
        Ok(Self {
            program,
            prefix_args,
            timeout,
            plan,
            destructive_allowed: overrides.allow_destructive || file.destructive_allowed,
        })
    }

    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(&self.program)
            .with_prefix_args(&self.prefix_args)
            .with_timeout(self.timeout)
    }

    /// `program prefix..` for display.
    pub fn target_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.prefix_args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

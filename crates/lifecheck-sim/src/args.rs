use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "lifecheck-sim",
    about = "Simulated instance-management CLI backed by a JSON state file",
    version
)]
pub struct SimCli {
    /// State file holding every simulated instance
    #[arg(long, default_value = "lifecheck-sim.json", global = true)]
    pub state: PathBuf,

    /// Inject a fault into one command: `<command>=<stderr|exit|garbage|empty>`
    #[arg(long = "fault", value_name = "COMMAND=KIND", global = true)]
    pub faults: Vec<Fault>,

    #[command(subcommand)]
    pub command: SimCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SimCommand {
    /// Create an instance
    Create {
        /// Block until the instance is running
        #[arg(short = 'w', long)]
        wait: bool,

        /// Print records as JSON lines
        #[arg(short = 'j', long)]
        json: bool,

        /// Instance alias
        #[arg(short = 'n', long)]
        name: String,

        image: String,
        package: String,
    },

    /// Show one instance
    Instance {
        #[arg(short = 'j', long)]
        json: bool,

        identifier: String,
    },

    /// Wait for an instance to reach a terminal state
    Wait { identifier: String },

    /// Stop an instance
    Stop(Transition),

    /// Start an instance
    Start(Transition),

    /// Delete an instance
    Delete(Transition),
}

impl SimCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Instance { .. } => "instance",
            Self::Wait { .. } => "wait",
            Self::Stop(_) => "stop",
            Self::Start(_) => "start",
            Self::Delete(_) => "delete",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct Transition {
    /// Block until the transition completes
    #[arg(short = 'w', long)]
    pub wait: bool,

    pub identifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FaultKind {
    /// Warn on stderr but succeed
    Stderr,
    /// Fail with exit 1 without touching state
    Exit,
    /// Replace stdout with non-JSON text
    Garbage,
    /// Suppress stdout
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub command: String,
    pub kind: FaultKind,
}

impl FromStr for Fault {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (command, kind) = s
            .split_once('=')
            .ok_or_else(|| format!("expected COMMAND=KIND, got `{s}`"))?;
        if command.is_empty() {
            return Err(format!("missing command in `{s}`"));
        }
        let kind = <FaultKind as ValueEnum>::from_str(kind, true)?;
        Ok(Self {
            command: command.to_string(),
            kind,
        })
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self
            .kind
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        write!(f, "{}={kind}", self.command)
    }
}

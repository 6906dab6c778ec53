//! Scenario plan and the context threaded from step to step.

use lifecheck_kernel::InstanceRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_ALIAS: &str = "lifecheck-test-vm-1";
pub const DEFAULT_IMAGE: &str = "base-64@15.2.0";
pub const DEFAULT_PACKAGE: &str = "t4-standard-128M";

/// What to create: the alias, image and package passed to `create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioPlan {
    pub alias: String,
    pub image: String,
    pub package: String,
}

impl Default for ScenarioPlan {
    fn default() -> Self {
        Self {
            alias: DEFAULT_ALIAS.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            package: DEFAULT_PACKAGE.to_string(),
        }
    }
}

/// The held record changed identity between observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("instance id changed from {held} to {observed}")]
pub struct IdChanged {
    pub held: Uuid,
    pub observed: Uuid,
}

/// State carried across steps: the plan and the last observed record of
/// the instance under test.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    plan: ScenarioPlan,
    instance: Option<InstanceRecord>,
}

impl ScenarioContext {
    pub fn new(plan: ScenarioPlan) -> Self {
        Self {
            plan,
            instance: None,
        }
    }

    pub fn plan(&self) -> &ScenarioPlan {
        &self.plan
    }

    pub fn instance(&self) -> Option<&InstanceRecord> {
        self.instance.as_ref()
    }

    pub fn instance_id(&self) -> Option<Uuid> {
        self.instance.as_ref().map(|record| record.id)
    }

    /// Start tracking a freshly created instance.
    pub fn establish(&mut self, record: InstanceRecord) {
        self.instance = Some(record);
    }

    /// Replace the held record with a fresher one of the same instance.
    ///
    /// A record with a different id is refused and the held record kept.
    pub fn observe(&mut self, record: InstanceRecord) -> Result<(), IdChanged> {
        if let Some(held) = &self.instance
            && held.id != record.id
        {
            return Err(IdChanged {
                held: held.id,
                observed: record.id,
            });
        }
        self.instance = Some(record);
        Ok(())
    }

    /// Stop tracking the instance (after a successful delete).
    pub fn clear(&mut self) -> Option<InstanceRecord> {
        self.instance.take()
    }
}

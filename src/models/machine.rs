use super::MachineId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineStatus {
    Active,
    Inactive,
    Maintenance,
    Broken,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
            Self::Maintenance => write!(f, "MAINTENANCE"),
            Self::Broken => write!(f, "BROKEN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub machine_id: MachineId,
    pub name: String,
    pub status: MachineStatus,
}

impl Machine {
    pub fn new(machine_id: MachineId, name: impl Into<String>) -> Self {
        Self {
            machine_id,
            name: name.into(),
            status: MachineStatus::Active,
        }
    }

    pub fn accepts_work(&self) -> bool {
        self.status == MachineStatus::Active
    }
}

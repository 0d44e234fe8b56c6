use crate::constants::topics;
use crate::models::{CellId, MachineId, PartId};
use crate::reconciliation::PushFrame;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Logical push-channel room
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Room(String);

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Pallet updates for one part
    pub fn pallets(part_id: PartId) -> Self {
        Self(format!("pallets:{part_id}"))
    }

    pub fn buffer(cell_id: CellId) -> Self {
        Self(format!("buffer:{cell_id}"))
    }

    pub fn machine(machine_id: MachineId) -> Self {
        Self(format!("machine:{machine_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn join_frame(&self) -> PushFrame {
        PushFrame::new(topics::JOIN_ROOM, json!({ "room": self.0 }))
    }

    pub fn leave_frame(&self) -> PushFrame {
        PushFrame::new(topics::LEAVE_ROOM, json!({ "room": self.0 }))
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

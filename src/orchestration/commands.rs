//! Operator commands accepted by the coordinator

use crate::models::{CellId, MachineId, Operation, OperatorId, Pallet, PalletId, SegmentId, StageId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartWork {
    pub pallet_id: PalletId,
    pub stage_id: StageId,
    pub machine_id: MachineId,
    pub operator_id: Option<OperatorId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteWork {
    pub pallet_id: PalletId,
    pub stage_id: StageId,
    /// Falls back to the machine recorded on the operation or the pallet location
    #[serde(default)]
    pub machine_id: Option<MachineId>,
    pub operator_id: Option<OperatorId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToBuffer {
    pub pallet_id: PalletId,
    pub cell_id: CellId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignToMachine {
    pub pallet_id: PalletId,
    pub machine_id: MachineId,
    pub segment_id: SegmentId,
    #[serde(default)]
    pub operator_id: Option<OperatorId>,
}

/// Confirmed result of `complete_work`
#[derive(Debug, Clone, PartialEq)]
pub struct StageCompletion {
    pub pallet: Pallet,
    pub completed: Operation,
    /// `None` once the route is exhausted
    pub next_operation: Option<Operation>,
    pub next_step_name: Option<String>,
}

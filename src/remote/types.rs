//! Wire types exchanged with the remote production service

use crate::models::{
    CellId, DistributionRequest, MachineId, Operation, OperatorId, Pallet, PalletId, SegmentId,
    StageId,
};
use serde::{Deserialize, Serialize};

/// Server-side pallet state as delivered by fetches and push events
pub type PalletSnapshot = Pallet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequest {
    pub pallet_id: PalletId,
    pub machine_id: MachineId,
    pub operator_id: OperatorId,
    pub stage_id: StageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteProcessingResponse {
    pub operation: Operation,
    pub pallet: PalletSnapshot,
    #[serde(default)]
    pub next_step_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToBufferRequest {
    pub pallet_id: PalletId,
    pub buffer_cell_id: CellId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToBufferResponse {
    pub pallet: PalletSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignToMachineRequest {
    pub pallet_id: PalletId,
    pub machine_id: MachineId,
    pub segment_id: SegmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<OperatorId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignToMachineResponse {
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectPartsRequest {
    pub pallet_id: PalletId,
    pub quantity: u32,
    pub reporter_id: OperatorId,
    pub stage_id: StageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<MachineId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reclamation {
    pub quantity: u32,
    pub pallet_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectedPallet {
    pub new_quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectPartsResponse {
    pub reclamation: Reclamation,
    pub pallet: DefectedPallet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedistributeRequest {
    pub source_pallet_id: PalletId,
    pub distributions: Vec<DistributionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<MachineId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedistributeResponse {
    pub source_pallet_deleted: bool,
    #[serde(default)]
    pub created_pallets: Vec<PalletSnapshot>,
    #[serde(default)]
    pub updated_pallets: Vec<PalletSnapshot>,
}

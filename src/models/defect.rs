use super::{MachineId, OperatorId, PalletId, StageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only ledger entry for parts permanently removed from a pallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectRecord {
    pub record_id: Uuid,
    pub pallet_id: PalletId,
    pub quantity: u32,
    pub reporter_id: OperatorId,
    #[serde(default)]
    pub stage_id: Option<StageId>,
    #[serde(default)]
    pub machine_id: Option<MachineId>,
    #[serde(default)]
    pub description: Option<String>,
    pub reported_at: DateTime<Utc>,
}

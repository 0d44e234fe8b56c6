use super::{MachineId, OperationId, OperatorId, PalletId, StageId};
use crate::state_machine::states::OperationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-pallet progress record against one route stage.
///
/// Operations are values: a transition yields a new `Operation` that replaces
/// the pallet's current one rather than mutating it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: OperationId,
    pub pallet_id: PalletId,
    pub stage_id: StageId,
    pub status: OperationStatus,
    #[serde(default)]
    pub machine_id: Option<MachineId>,
    #[serde(default)]
    pub operator_id: Option<OperatorId>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn new(
        operation_id: OperationId,
        pallet_id: PalletId,
        stage_id: StageId,
        status: OperationStatus,
    ) -> Self {
        Self {
            operation_id,
            pallet_id,
            stage_id,
            status,
            machine_id: None,
            operator_id: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Successor record with the given status, stamping start/completion times
    pub fn with_status(&self, status: OperationStatus, at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.status = status;
        match status {
            OperationStatus::InProgress => {
                next.started_at = Some(at);
                next.completed_at = None;
            }
            OperationStatus::Completed => next.completed_at = Some(at),
            _ => {}
        }
        next
    }

    /// Fresh, not-started copy of this record for another pallet
    pub fn cloned_for(&self, operation_id: OperationId, pallet_id: PalletId, status: OperationStatus) -> Self {
        Self::new(operation_id, pallet_id, self.stage_id, status)
    }
}

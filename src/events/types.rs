use crate::error::ErrorKind;
use crate::models::{
    BufferCell, DefectRecord, MachineId, MachineStatus, Pallet, PalletId, StageId,
};
use crate::state_machine::states::OperationStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle event names, stable across releases
pub mod names {
    pub const STAGE_TRANSITIONED: &str = "stage.transitioned";
    pub const PALLET_UPSERTED: &str = "pallet.upserted";
    pub const PALLET_REMOVED: &str = "pallet.removed";
    pub const DEFECT_RECORDED: &str = "defect.recorded";
    pub const PALLET_REDISTRIBUTED: &str = "pallet.redistributed";
    pub const BUFFER_CELL_CHANGED: &str = "buffer.cell_changed";
    pub const MACHINE_STATUS_CHANGED: &str = "machine.status_changed";
    pub const CATALOG_CHANGED: &str = "catalog.changed";
    pub const COMMAND_REJECTED: &str = "command.rejected";
}

/// Who caused a change to the local mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// Optimistic or confirmed result of a command issued here
    Local,
    /// Pushed or re-fetched server state
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogChange {
    Created,
    Updated,
    Deleted,
}

/// Typed lifecycle events delivered to listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PalletEvent {
    StageTransitioned {
        pallet_id: PalletId,
        stage_id: StageId,
        from: OperationStatus,
        to: OperationStatus,
    },
    PalletUpserted {
        pallet: Pallet,
        origin: ChangeOrigin,
    },
    PalletRemoved {
        pallet_id: PalletId,
        origin: ChangeOrigin,
    },
    DefectRecorded {
        record: DefectRecord,
        pallet_deleted: bool,
    },
    Redistributed {
        source_pallet_id: PalletId,
        source_deleted: bool,
        created: Vec<PalletId>,
        updated: Vec<PalletId>,
    },
    BufferCellChanged {
        cell: BufferCell,
    },
    MachineStatusChanged {
        machine_id: MachineId,
        status: MachineStatus,
    },
    CatalogChanged {
        change: CatalogChange,
        payload: Value,
    },
    CommandRejected {
        pallet_id: PalletId,
        kind: ErrorKind,
        code: String,
        message: String,
    },
}

impl PalletEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::StageTransitioned { .. } => names::STAGE_TRANSITIONED,
            Self::PalletUpserted { .. } => names::PALLET_UPSERTED,
            Self::PalletRemoved { .. } => names::PALLET_REMOVED,
            Self::DefectRecorded { .. } => names::DEFECT_RECORDED,
            Self::Redistributed { .. } => names::PALLET_REDISTRIBUTED,
            Self::BufferCellChanged { .. } => names::BUFFER_CELL_CHANGED,
            Self::MachineStatusChanged { .. } => names::MACHINE_STATUS_CHANGED,
            Self::CatalogChanged { .. } => names::CATALOG_CHANGED,
            Self::CommandRejected { .. } => names::COMMAND_REJECTED,
        }
    }

    /// The pallet this event is about, if any
    pub fn pallet_id(&self) -> Option<PalletId> {
        match self {
            Self::StageTransitioned { pallet_id, .. }
            | Self::PalletRemoved { pallet_id, .. }
            | Self::CommandRejected { pallet_id, .. } => Some(*pallet_id),
            Self::PalletUpserted { pallet, .. } => Some(pallet.pallet_id),
            Self::DefectRecorded { record, .. } => Some(record.pallet_id),
            Self::Redistributed { source_pallet_id, .. } => Some(*source_pallet_id),
            Self::BufferCellChanged { .. }
            | Self::MachineStatusChanged { .. }
            | Self::CatalogChanged { .. } => None,
        }
    }
}

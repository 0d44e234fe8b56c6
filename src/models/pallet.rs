use super::{CellId, MachineId, Operation, PalletId, PartId, StageId};
use serde::{Deserialize, Serialize};

/// Physical location of a pallet. A pallet is on a machine, in a buffer cell,
/// or nowhere; the variants make "both at once" unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PalletLocation {
    #[default]
    Unassigned,
    #[serde(rename_all = "camelCase")]
    OnMachine { machine_id: MachineId },
    #[serde(rename_all = "camelCase")]
    InBuffer { cell_id: CellId },
}

impl PalletLocation {
    pub fn machine_id(&self) -> Option<MachineId> {
        match self {
            Self::OnMachine { machine_id } => Some(*machine_id),
            _ => None,
        }
    }

    pub fn cell_id(&self) -> Option<CellId> {
        match self {
            Self::InBuffer { cell_id } => Some(*cell_id),
            _ => None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        !matches!(self, Self::Unassigned)
    }
}

/// A tracked batch of identical parts moving together through production
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pallet {
    pub pallet_id: PalletId,
    pub name: String,
    pub quantity: u32,
    pub part_id: PartId,
    #[serde(default)]
    pub location: PalletLocation,
    #[serde(default)]
    pub current_stage_progress: Option<Operation>,
    /// Records for stages other than the current one, oldest first
    #[serde(default)]
    pub stage_history: Vec<Operation>,
    /// Server-assigned monotonic version, absent on locally created pallets
    #[serde(default)]
    pub version: Option<u64>,
}

impl Pallet {
    pub fn new(pallet_id: PalletId, name: impl Into<String>, quantity: u32, part_id: PartId) -> Self {
        Self {
            pallet_id,
            name: name.into(),
            quantity,
            part_id,
            location: PalletLocation::Unassigned,
            current_stage_progress: None,
            stage_history: Vec::new(),
            version: None,
        }
    }

    /// Locally created pallets carry negative ids until the server confirms them
    pub fn is_tentative(&self) -> bool {
        self.pallet_id < 0
    }

    pub fn current_stage_id(&self) -> Option<StageId> {
        self.current_stage_progress.as_ref().map(|op| op.stage_id)
    }

    /// Most recent record for `stage_id`, looking at the current operation first
    pub fn record_for_stage(&self, stage_id: StageId) -> Option<&Operation> {
        self.current_stage_progress
            .iter()
            .filter(|op| op.stage_id == stage_id)
            .chain(self.stage_history.iter().rev().filter(|op| op.stage_id == stage_id))
            .next()
    }

    /// Carry over the local stage history when a server snapshot omits it.
    /// Records for the snapshot's current stage are not carried.
    pub fn inherit_history(&mut self, local: &Pallet) {
        if !self.stage_history.is_empty() {
            return;
        }
        let current = self.current_stage_id();
        self.stage_history = local
            .stage_history
            .iter()
            .filter(|op| Some(op.stage_id) != current)
            .cloned()
            .collect();
    }

    /// Install `next` as the current operation, archiving the previous one
    pub fn advance_to(&mut self, archived: Operation, next: Option<Operation>) {
        self.stage_history.push(archived);
        if let Some(next) = next {
            self.current_stage_progress = Some(next);
        } else {
            self.current_stage_progress = self.stage_history.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::states::OperationStatus;

    #[test]
    fn test_location_accessors() {
        let loc = PalletLocation::InBuffer { cell_id: 7 };
        assert_eq!(loc.cell_id(), Some(7));
        assert_eq!(loc.machine_id(), None);
        assert!(loc.is_assigned());
        assert!(!PalletLocation::Unassigned.is_assigned());
    }

    #[test]
    fn test_location_wire_format() {
        let json = serde_json::to_value(PalletLocation::OnMachine { machine_id: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "onMachine", "machineId": 4}));
    }

    #[test]
    fn test_record_for_stage_prefers_current() {
        let mut pallet = Pallet::new(1, "П-1", 10, 5);
        pallet.stage_history.push(Operation::new(1, 1, 10, OperationStatus::Completed));
        pallet.current_stage_progress = Some(Operation::new(2, 1, 20, OperationStatus::Pending));

        assert_eq!(pallet.record_for_stage(10).unwrap().operation_id, 1);
        assert_eq!(pallet.record_for_stage(20).unwrap().operation_id, 2);
        assert!(pallet.record_for_stage(30).is_none());
    }

    #[test]
    fn test_advance_keeps_final_record_current() {
        let mut pallet = Pallet::new(1, "П-1", 10, 5);
        let done = Operation::new(2, 1, 20, OperationStatus::Completed);
        pallet.advance_to(done.clone(), None);
        assert_eq!(pallet.current_stage_progress, Some(done));
        assert!(pallet.stage_history.is_empty());
    }
}

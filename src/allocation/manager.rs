//! # Buffer Allocation Manager
//!
//! Keeps a pallet in at most one physical place. Every assignment replaces the
//! pallet's [`PalletLocation`] as a whole and updates buffer-cell occupancy
//! under the same cell-registry lock, so a pallet can never be observed on a
//! machine and in a cell at once.
//!
//! Lock order is cell registry first, then pallet store.

use super::registry::{BufferCellRegistry, MachineRegistry};
use crate::error::{PalletError, PalletResult};
use crate::models::{
    BufferCell, CellId, Machine, MachineId, PalletId, PalletLocation, SegmentId,
};
use crate::state_machine::OperationStatus;
use crate::store::PalletStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything needed to undo one assignment
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationChange {
    pub pallet_id: PalletId,
    pub previous_location: PalletLocation,
    pub new_location: PalletLocation,
    pub segment_id: Option<SegmentId>,
    /// Cells touched by the assignment, as they were before it
    previous_cells: Vec<BufferCell>,
}

impl AllocationChange {
    pub fn is_noop(&self) -> bool {
        self.previous_location == self.new_location
    }
}

#[derive(Debug, Clone)]
pub struct BufferAllocationManager {
    store: Arc<PalletStore>,
    cells: Arc<BufferCellRegistry>,
    machines: Arc<MachineRegistry>,
}

impl BufferAllocationManager {
    pub fn new(
        store: Arc<PalletStore>,
        cells: Arc<BufferCellRegistry>,
        machines: Arc<MachineRegistry>,
    ) -> Self {
        Self {
            store,
            cells,
            machines,
        }
    }

    pub fn cells(&self) -> &Arc<BufferCellRegistry> {
        &self.cells
    }

    pub fn machines(&self) -> &Arc<MachineRegistry> {
        &self.machines
    }

    /// Place the pallet in `cell_id`, releasing any cell or machine it held
    pub fn assign_to_buffer(&self, pallet_id: PalletId, cell_id: CellId) -> PalletResult<AllocationChange> {
        let mut cells = self.cells.lock();

        let target = cells
            .get(&cell_id)
            .ok_or(PalletError::CellNotFound { cell_id })?;
        if !target.accepts(pallet_id) {
            return Err(PalletError::CellUnavailable {
                cell_id,
                cell_code: target.code.clone(),
                status: target.status.to_string(),
            });
        }

        let previous_cells: Vec<BufferCell> = cells
            .values()
            .filter(|cell| cell.cell_id == cell_id || cell.occupant == Some(pallet_id))
            .cloned()
            .collect();

        let new_location = PalletLocation::InBuffer { cell_id };
        let mut previous_location = PalletLocation::Unassigned;
        let pallet = self.store.update(pallet_id, |pallet| {
            previous_location = pallet.location;
            pallet.location = new_location;
            Ok(())
        })?;

        for cell in cells.values_mut() {
            if cell.occupant == Some(pallet_id) && cell.cell_id != cell_id {
                cell.release();
            }
        }
        if let Some(cell) = cells.get_mut(&cell_id) {
            cell.occupy(pallet_id, pallet.quantity);
        }

        info!(pallet_id, cell_id, "Pallet assigned to buffer cell");
        Ok(AllocationChange {
            pallet_id,
            previous_location,
            new_location,
            segment_id: None,
            previous_cells,
        })
    }

    /// Place the pallet on `machine_id`, releasing any held buffer cell.
    ///
    /// Rejected while the pallet's current operation is in progress on a
    /// different machine.
    pub fn assign_to_machine(
        &self,
        pallet_id: PalletId,
        machine_id: MachineId,
        segment_id: Option<SegmentId>,
    ) -> PalletResult<AllocationChange> {
        let machine = self.machines.get(machine_id)?;
        ensure_accepts_work(&machine)?;

        let mut cells = self.cells.lock();
        let previous_cells: Vec<BufferCell> = cells
            .values()
            .filter(|cell| cell.occupant == Some(pallet_id))
            .cloned()
            .collect();

        let new_location = PalletLocation::OnMachine { machine_id };
        let mut previous_location = PalletLocation::Unassigned;
        self.store.update(pallet_id, |pallet| {
            if let Some(op) = &pallet.current_stage_progress {
                if op.status == OperationStatus::InProgress {
                    let busy_on = op.machine_id.or_else(|| pallet.location.machine_id());
                    if let Some(other) = busy_on.filter(|other| *other != machine_id) {
                        return Err(PalletError::PalletBusy {
                            pallet_id,
                            machine_name: self.machines.display_name(other),
                        });
                    }
                }
            }
            previous_location = pallet.location;
            pallet.location = new_location;
            Ok(())
        })?;

        for cell in cells.values_mut() {
            if cell.occupant == Some(pallet_id) {
                cell.release();
            }
        }

        info!(pallet_id, machine_id, segment_id, "Pallet assigned to machine");
        Ok(AllocationChange {
            pallet_id,
            previous_location,
            new_location,
            segment_id,
            previous_cells,
        })
    }

    /// Free whatever cell the pallet holds, e.g. after it was deleted
    pub fn release(&self, pallet_id: PalletId) -> Option<CellId> {
        let mut cells = self.cells.lock();
        let held = cells
            .values_mut()
            .find(|cell| cell.occupant == Some(pallet_id))?;
        held.release();
        debug!(pallet_id, cell_id = held.cell_id, "Buffer cell released");
        Some(held.cell_id)
    }

    /// Undo an assignment. The pallet location is restored only if the pallet
    /// still sits where the change put it.
    pub fn revert(&self, change: AllocationChange) {
        let mut cells = self.cells.lock();
        for cell in change.previous_cells {
            cells.insert(cell.cell_id, cell);
        }
        let _ = self.store.update(change.pallet_id, |pallet| {
            if pallet.location == change.new_location {
                pallet.location = change.previous_location;
            }
            Ok(())
        });
        debug!(pallet_id = change.pallet_id, "Allocation reverted");
    }

    /// Keep cell occupancy consistent with a pallet location delivered by the server
    pub fn sync_location(&self, pallet_id: PalletId, location: PalletLocation) {
        let mut cells = self.cells.lock();
        let quantity = self.store.get(pallet_id).map(|p| p.quantity).unwrap_or(0);
        for cell in cells.values_mut() {
            if cell.occupant == Some(pallet_id) && location.cell_id() != Some(cell.cell_id) {
                cell.release();
            }
        }
        if let Some(cell) = location.cell_id().and_then(|id| cells.get_mut(&id)) {
            cell.occupy(pallet_id, quantity);
        }
    }
}

fn ensure_accepts_work(machine: &Machine) -> PalletResult<()> {
    if machine.accepts_work() {
        Ok(())
    } else {
        Err(PalletError::MachineUnavailable {
            machine_name: machine.name.clone(),
            status: machine.status.to_string(),
        })
    }
}

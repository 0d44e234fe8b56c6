use crate::error::{PalletError, PalletResult};
use crate::models::{BufferCell, CellId, Machine, MachineId, MachineStatus, PalletId};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::BTreeMap;

/// Shared buffer-cell reference data plus occupancy
#[derive(Debug, Default)]
pub struct BufferCellRegistry {
    cells: RwLock<BTreeMap<CellId, BufferCell>>,
}

impl BufferCellRegistry {
    pub fn new(cells: impl IntoIterator<Item = BufferCell>) -> Self {
        Self {
            cells: RwLock::new(cells.into_iter().map(|c| (c.cell_id, c)).collect()),
        }
    }

    pub fn get(&self, cell_id: CellId) -> PalletResult<BufferCell> {
        self.cells
            .read()
            .get(&cell_id)
            .cloned()
            .ok_or(PalletError::CellNotFound { cell_id })
    }

    pub fn cells(&self) -> Vec<BufferCell> {
        self.cells.read().values().cloned().collect()
    }

    /// Cell currently holding `pallet_id`, if any
    pub fn held_by(&self, pallet_id: PalletId) -> Option<BufferCell> {
        self.cells
            .read()
            .values()
            .find(|cell| cell.occupant == Some(pallet_id))
            .cloned()
    }

    /// Insert or replace a cell from a server snapshot
    pub fn upsert(&self, cell: BufferCell) -> Option<BufferCell> {
        self.cells.write().insert(cell.cell_id, cell)
    }

    pub(crate) fn lock(&self) -> RwLockWriteGuard<'_, BTreeMap<CellId, BufferCell>> {
        self.cells.write()
    }
}

/// Machine reference data
#[derive(Debug, Default)]
pub struct MachineRegistry {
    machines: RwLock<BTreeMap<MachineId, Machine>>,
}

impl MachineRegistry {
    pub fn new(machines: impl IntoIterator<Item = Machine>) -> Self {
        Self {
            machines: RwLock::new(machines.into_iter().map(|m| (m.machine_id, m)).collect()),
        }
    }

    pub fn get(&self, machine_id: MachineId) -> PalletResult<Machine> {
        self.machines
            .read()
            .get(&machine_id)
            .cloned()
            .ok_or(PalletError::MachineNotFound { machine_id })
    }

    pub fn machines(&self) -> Vec<Machine> {
        self.machines.read().values().cloned().collect()
    }

    /// Display name for a machine, falling back to its id when unknown
    pub fn display_name(&self, machine_id: MachineId) -> String {
        self.machines
            .read()
            .get(&machine_id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| format!("machine {machine_id}"))
    }

    pub fn upsert(&self, machine: Machine) -> Option<Machine> {
        self.machines.write().insert(machine.machine_id, machine)
    }

    /// Returns `false` when the machine is unknown
    pub fn set_status(&self, machine_id: MachineId, status: MachineStatus) -> bool {
        match self.machines.write().get_mut(&machine_id) {
            Some(machine) => {
                machine.status = status;
                true
            }
            None => false,
        }
    }
}

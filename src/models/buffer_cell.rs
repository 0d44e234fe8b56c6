use super::{CellId, PalletId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellStatus {
    Available,
    Occupied,
    Reserved,
    Maintenance,
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "AVAILABLE"),
            Self::Occupied => write!(f, "OCCUPIED"),
            Self::Reserved => write!(f, "RESERVED"),
            Self::Maintenance => write!(f, "MAINTENANCE"),
        }
    }
}

/// Physical storage slot. In this model a cell hosts at most one pallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferCell {
    pub cell_id: CellId,
    pub code: String,
    pub capacity: u32,
    pub current_load: u32,
    pub status: CellStatus,
    #[serde(default)]
    pub occupant: Option<PalletId>,
}

impl BufferCell {
    pub fn new(cell_id: CellId, code: impl Into<String>, capacity: u32) -> Self {
        Self {
            cell_id,
            code: code.into(),
            capacity,
            current_load: 0,
            status: CellStatus::Available,
            occupant: None,
        }
    }

    /// An available cell, or the cell this pallet already holds
    pub fn accepts(&self, pallet_id: PalletId) -> bool {
        match self.occupant {
            Some(occupant) => occupant == pallet_id,
            None => self.status == CellStatus::Available,
        }
    }

    pub fn occupy(&mut self, pallet_id: PalletId, quantity: u32) {
        self.occupant = Some(pallet_id);
        self.current_load = quantity;
        self.status = CellStatus::Occupied;
    }

    pub fn release(&mut self) {
        self.occupant = None;
        self.current_load = 0;
        if self.status == CellStatus::Occupied {
            self.status = CellStatus::Available;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_acceptance() {
        let mut cell = BufferCell::new(1, "A-01", 1);
        assert!(cell.accepts(10));

        cell.occupy(10, 25);
        assert!(cell.accepts(10));
        assert!(!cell.accepts(11));
        assert_eq!(cell.status, CellStatus::Occupied);

        cell.release();
        assert_eq!(cell.status, CellStatus::Available);
        assert_eq!(cell.current_load, 0);
    }

    #[test]
    fn test_maintenance_cell_is_not_released_to_available() {
        let mut cell = BufferCell::new(2, "A-02", 1);
        cell.status = CellStatus::Maintenance;
        assert!(!cell.accepts(10));
        cell.release();
        assert_eq!(cell.status, CellStatus::Maintenance);
    }
}

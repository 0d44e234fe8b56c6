//! # Defect Ledger
//!
//! Append-only record of parts permanently removed from pallets. Reporting a
//! defect decrements the pallet by exactly the defected quantity; a pallet that
//! reaches zero is removed from the store.

use crate::error::PalletResult;
use crate::logging::log_pallet_operation;
use crate::models::{DefectRecord, MachineId, OperatorId, Pallet, PalletId, StageId};
use crate::store::PalletStore;
use crate::validation::{validate_description, validate_quantity_available};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operator input for a defect report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefectReport {
    pub pallet_id: PalletId,
    pub quantity: u32,
    pub reporter_id: OperatorId,
    #[serde(default)]
    pub stage_id: Option<StageId>,
    #[serde(default)]
    pub machine_id: Option<MachineId>,
    #[serde(default)]
    pub description: Option<String>,
}

impl DefectReport {
    pub fn new(pallet_id: PalletId, quantity: u32, reporter_id: OperatorId) -> Self {
        Self {
            pallet_id,
            quantity,
            reporter_id,
            stage_id: None,
            machine_id: None,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn at_stage(mut self, stage_id: StageId) -> Self {
        self.stage_id = Some(stage_id);
        self
    }

    pub fn on_machine(mut self, machine_id: MachineId) -> Self {
        self.machine_id = Some(machine_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefectOutcome {
    pub record: DefectRecord,
    pub new_quantity: u32,
    pub pallet_deleted: bool,
    /// The pallet as it was before the defect was applied
    pub previous: Pallet,
}

#[derive(Debug, Default)]
pub struct DefectLedger {
    records: RwLock<Vec<DefectRecord>>,
}

impl DefectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and apply a defect against `store`, appending a record.
    ///
    /// On failure neither the store nor the ledger is modified.
    pub fn report_defect(&self, store: &PalletStore, report: DefectReport) -> PalletResult<DefectOutcome> {
        let description = validate_description(report.description.as_deref())?;

        let mut records = self.records.write();
        let (previous, new_quantity) = store.mutate(|tx| {
            let pallet = tx.get_mut(report.pallet_id)?;
            validate_quantity_available(report.pallet_id, report.quantity, pallet.quantity)?;

            let previous = pallet.clone();
            pallet.quantity -= report.quantity;
            let new_quantity = pallet.quantity;
            if new_quantity == 0 {
                tx.remove(report.pallet_id);
            }
            Ok((previous, new_quantity))
        })?;

        let record = DefectRecord {
            record_id: Uuid::new_v4(),
            pallet_id: report.pallet_id,
            quantity: report.quantity,
            reporter_id: report.reporter_id,
            stage_id: report
                .stage_id
                .or_else(|| previous.current_stage_id()),
            machine_id: report.machine_id,
            description,
            reported_at: Utc::now(),
        };
        records.push(record.clone());
        drop(records);

        let pallet_deleted = new_quantity == 0;
        log_pallet_operation(
            "report_defect",
            report.pallet_id,
            None,
            if pallet_deleted { "pallet_deleted" } else { "applied" },
            Some(&format!("quantity={} remaining={new_quantity}", report.quantity)),
        );

        Ok(DefectOutcome {
            record,
            new_quantity,
            pallet_deleted,
            previous,
        })
    }

    /// Drop a record that the remote service refused
    pub fn retract(&self, record_id: Uuid) -> Option<DefectRecord> {
        let mut records = self.records.write();
        let index = records.iter().position(|r| r.record_id == record_id)?;
        Some(records.remove(index))
    }

    pub fn records(&self) -> Vec<DefectRecord> {
        self.records.read().clone()
    }

    pub fn records_for(&self, pallet_id: PalletId) -> Vec<DefectRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.pallet_id == pallet_id)
            .cloned()
            .collect()
    }

    pub fn total_defected(&self) -> u64 {
        self.records.read().iter().map(|r| u64::from(r.quantity)).sum()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

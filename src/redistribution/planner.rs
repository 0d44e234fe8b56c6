//! # Redistribution Planner
//!
//! Splits a pallet's quantity across existing and new pallets. A plan is
//! validated and applied inside a single [`PalletStore::mutate`] call, so the
//! whole plan commits or nothing does, and the sum of quantities across the
//! affected pallets is identical before and after.

use crate::error::{PalletError, PalletResult};
use crate::logging::log_pallet_operation;
use crate::models::{
    DistributionTarget, Operation, OperationId, Pallet, PalletId, PalletLocation, PartId, RedistributionPlan,
};
use crate::state_machine::{OperationStatus, StageStateMachine};
use crate::store::{PalletStore, StoreTransaction};
use crate::validation::{validate_pallet_name, validate_quantity};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct RedistributionOutcome {
    pub source_pallet_id: PalletId,
    pub source_deleted: bool,
    /// Quantity left on the source pallet
    pub remainder: u32,
    /// Tentatively created pallets, in plan order
    pub created: Vec<Pallet>,
    /// Existing targets after the increment, in plan order
    pub updated: Vec<Pallet>,
}

#[derive(Debug, Clone)]
pub struct RedistributionPlanner {
    store: Arc<PalletStore>,
}

impl RedistributionPlanner {
    pub fn new(store: Arc<PalletStore>) -> Self {
        Self { store }
    }

    /// Check a plan against the current store without changing anything
    pub fn validate(&self, plan: &RedistributionPlan) -> PalletResult<()> {
        let pallets = self.store.pallets();
        validate_plan(
            plan,
            self.store.part().part_id,
            |id| pallets.iter().find(|p| p.pallet_id == id),
            |name| pallets.iter().any(|p| p.name == name),
        )
    }

    /// Validate and apply `plan` atomically
    pub fn redistribute(&self, plan: &RedistributionPlan) -> PalletResult<RedistributionOutcome> {
        let part_id = self.store.part().part_id;
        let outcome = self.store.mutate(|tx| apply_plan(tx, part_id, plan))?;

        log_pallet_operation(
            "redistribute",
            plan.source_pallet_id,
            None,
            if outcome.source_deleted { "source_deleted" } else { "applied" },
            Some(&format!(
                "distributed={} remainder={} created={} updated={}",
                plan.total_quantity(),
                outcome.remainder,
                outcome.created.len(),
                outcome.updated.len()
            )),
        );
        Ok(outcome)
    }

    /// Replace tentative pallets with the server-confirmed ones, matching by name.
    /// Returns the ids of tentative pallets that had no confirmed counterpart.
    pub fn confirm_created(&self, created: &[Pallet], confirmed: Vec<Pallet>) -> Vec<PalletId> {
        let mut unmatched = Vec::new();
        let mut confirmed = confirmed;
        for tentative in created {
            match confirmed.iter().position(|p| p.name == tentative.name) {
                Some(index) => {
                    let pallet = confirmed.swap_remove(index);
                    if let Err(e) = self.store.replace_tentative(tentative.pallet_id, pallet) {
                        debug!(pallet_id = tentative.pallet_id, error = %e, "Tentative pallet already gone");
                    }
                }
                None => unmatched.push(tentative.pallet_id),
            }
        }
        unmatched
    }
}

fn validate_plan<'a>(
    plan: &RedistributionPlan,
    part_id: PartId,
    find: impl Fn(PalletId) -> Option<&'a Pallet>,
    name_taken: impl Fn(&str) -> bool,
) -> PalletResult<()> {
    if plan.distributions.is_empty() {
        return Err(PalletError::validation(
            "Redistribution plan has no distributions",
        ));
    }

    let source = find(plan.source_pallet_id).ok_or(PalletError::PalletNotFound {
        pallet_id: plan.source_pallet_id,
    })?;

    let mut seen_targets = HashSet::new();
    let mut seen_names = HashSet::new();
    for distribution in &plan.distributions {
        validate_quantity(distribution.quantity)?;

        match &distribution.target {
            DistributionTarget::ExistingPallet { pallet_id } => {
                if *pallet_id == source.pallet_id {
                    return Err(PalletError::validation(
                        "Cannot redistribute a pallet onto itself",
                    ));
                }
                let target = find(*pallet_id).ok_or(PalletError::PalletNotFound {
                    pallet_id: *pallet_id,
                })?;
                if target.part_id != part_id {
                    return Err(PalletError::validation(format!(
                        "Pallet {} belongs to another part",
                        target.name
                    )));
                }
                if !seen_targets.insert(*pallet_id) {
                    return Err(PalletError::validation(format!(
                        "Pallet {} is listed more than once",
                        target.name
                    )));
                }
                if target.quantity.checked_add(distribution.quantity).is_none() {
                    return Err(PalletError::validation(format!(
                        "Quantity overflow on pallet {}",
                        target.name
                    )));
                }
            }
            DistributionTarget::NewPallet { name } => {
                let name = validate_pallet_name(name)?;
                if !seen_names.insert(name.to_string()) {
                    return Err(PalletError::validation(format!(
                        "Pallet name {name} is used more than once"
                    )));
                }
                if name_taken(name) {
                    return Err(PalletError::validation(format!(
                        "Pallet {name} already exists"
                    )));
                }
            }
        }
    }

    let total = plan.total_quantity();
    if total > u64::from(source.quantity) {
        return Err(PalletError::InsufficientQuantity {
            pallet_id: source.pallet_id,
            requested: u32::try_from(total).unwrap_or(u32::MAX),
            available: source.quantity,
        });
    }

    Ok(())
}

fn apply_plan(
    tx: &mut StoreTransaction<'_>,
    part_id: PartId,
    plan: &RedistributionPlan,
) -> PalletResult<RedistributionOutcome> {
    validate_plan(
        plan,
        part_id,
        |id| tx.get(id).ok(),
        |name| tx.pallets().any(|p| p.name == name),
    )?;

    let source = tx.get(plan.source_pallet_id)?.clone();
    let mut created = Vec::new();
    let mut updated = Vec::new();

    for distribution in &plan.distributions {
        match &distribution.target {
            DistributionTarget::ExistingPallet { pallet_id } => {
                let target = tx.get_mut(*pallet_id)?;
                target.quantity += distribution.quantity;
                updated.push(target.clone());
            }
            DistributionTarget::NewPallet { name } => {
                let pallet = new_pallet_from(
                    &source,
                    tx.next_tentative_id(),
                    tx.next_tentative_id(),
                    name.trim(),
                    distribution.quantity,
                    tx,
                );
                created.push(pallet.clone());
                tx.insert(pallet);
            }
        }
    }

    // Validated above: the distributed total fits in the source quantity
    let distributed = u32::try_from(plan.total_quantity())
        .map_err(|_| PalletError::Internal("distributed total exceeds u32".into()))?;
    let source_pallet = tx.get_mut(plan.source_pallet_id)?;
    source_pallet.quantity -= distributed;
    let remainder = source_pallet.quantity;
    let source_deleted = remainder == 0;
    if source_deleted {
        tx.remove(plan.source_pallet_id);
    }

    Ok(RedistributionOutcome {
        source_pallet_id: plan.source_pallet_id,
        source_deleted,
        remainder,
        created,
        updated,
    })
}

/// New pallet at the source's current stage, not started, with no location
fn new_pallet_from(
    source: &Pallet,
    pallet_id: PalletId,
    operation_id: OperationId,
    name: &str,
    quantity: u32,
    tx: &StoreTransaction<'_>,
) -> Pallet {
    let mut pallet = Pallet::new(pallet_id, name, quantity, source.part_id);
    pallet.location = PalletLocation::Unassigned;
    pallet.stage_history = source
        .stage_history
        .iter()
        .map(|op| {
            let mut copy = op.clone();
            copy.pallet_id = pallet_id;
            copy
        })
        .collect();

    pallet.current_stage_progress = source.current_stage_progress.as_ref().map(|op| {
        let status = not_started_status(&pallet, tx, op);
        op.cloned_for(operation_id, pallet_id, status)
    });
    pallet
}

fn not_started_status(pallet: &Pallet, tx: &StoreTransaction<'_>, op: &Operation) -> OperationStatus {
    let route = tx.route();
    let unlocked = match route.predecessor_of(op.stage_id) {
        Some(prev) => pallet
            .record_for_stage(prev.stage_id)
            .is_some_and(|record| record.status.satisfies_successor()),
        None => true,
    };
    if unlocked {
        OperationStatus::Pending
    } else {
        StageStateMachine::initial_status(route, op.stage_id)
    }
}

//! # Event Reconciler
//!
//! Applies externally delivered state onto the local mirror. Events arrive on
//! a single inbound channel; pallet snapshots go through the store's version
//! policy, reference data (cells, machines, catalog) is applied directly, and
//! anything that needs a fresh server read is funnelled through the per-pallet
//! debouncer.
//!
//! While a local command is in flight for a pallet its pushed snapshots are not
//! applied; a debounced re-fetch is scheduled instead so the final server state
//! lands after the command resolves.

use super::debounce::RefetchDebouncer;
use super::push_event::PushEvent;
use crate::allocation::BufferAllocationManager;
use crate::config::ReconciliationConfig;
use crate::error::{PalletError, PalletResult};
use crate::events::{ChangeOrigin, EventPublisher, PalletEvent};
use crate::logging::{log_error, log_reconciliation};
use crate::models::{Operation, PalletId};
use crate::orchestration::InFlightRegistry;
use crate::remote::{classify_remote_error, PalletSnapshot, ProductionService};
use crate::store::{ApplyOutcome, PalletStore, SkipReason};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// What handling one push event did
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// A pallet snapshot, operation or deletion was evaluated
    Pallet {
        pallet_id: PalletId,
        outcome: ApplyOutcome,
    },
    /// A debounced re-fetch was armed for the pallet
    RefetchScheduled { pallet_id: PalletId },
    /// Buffer, machine or catalog reference data was updated
    ReferenceData,
    /// Room membership acknowledgement or error
    Membership,
}

pub struct EventReconciler {
    store: Arc<PalletStore>,
    allocation: BufferAllocationManager,
    in_flight: InFlightRegistry,
    publisher: EventPublisher,
    service: Arc<dyn ProductionService>,
    debouncer: RefetchDebouncer,
    refetches: Mutex<Option<mpsc::UnboundedReceiver<PalletId>>>,
}

impl std::fmt::Debug for EventReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReconciler")
            .field("pallets", &self.store.len())
            .field("in_flight", &self.in_flight.len())
            .field("pending_refetches", &self.debouncer.pending())
            .finish()
    }
}

impl EventReconciler {
    pub fn new(
        store: Arc<PalletStore>,
        allocation: BufferAllocationManager,
        in_flight: InFlightRegistry,
        publisher: EventPublisher,
        service: Arc<dyn ProductionService>,
        config: &ReconciliationConfig,
    ) -> Self {
        let (debouncer, refetches) = RefetchDebouncer::new(config.debounce_window());
        Self {
            store,
            allocation,
            in_flight,
            publisher,
            service,
            debouncer,
            refetches: Mutex::new(Some(refetches)),
        }
    }

    /// Bounded inbound channel sized from configuration
    pub fn channel(config: &ReconciliationConfig) -> (mpsc::Sender<PushEvent>, mpsc::Receiver<PushEvent>) {
        mpsc::channel(config.event_channel_capacity)
    }

    pub fn debouncer(&self) -> &RefetchDebouncer {
        &self.debouncer
    }

    /// Arm a debounced re-fetch of `pallet_id`
    pub fn schedule_refetch(&self, pallet_id: PalletId) {
        self.debouncer.trigger(pallet_id);
    }

    /// Apply one push event
    pub fn handle(&self, event: PushEvent) -> ReconcileOutcome {
        match event {
            PushEvent::PalletSnapshot(snapshot) => {
                let pallet_id = snapshot.pallet_id;
                if self.defer_if_busy(pallet_id) {
                    return self.deferred(pallet_id);
                }
                ReconcileOutcome::Pallet {
                    pallet_id,
                    outcome: self.apply_snapshot(snapshot),
                }
            }
            PushEvent::PalletDeleted { pallet_id, version } => {
                if self.defer_if_busy(pallet_id) {
                    return self.deferred(pallet_id);
                }
                ReconcileOutcome::Pallet {
                    pallet_id,
                    outcome: self.apply_deletion(pallet_id, version),
                }
            }
            PushEvent::PalletChanged { pallet_id } => {
                self.schedule_refetch(pallet_id);
                ReconcileOutcome::RefetchScheduled { pallet_id }
            }
            PushEvent::OperationSnapshot(operation) => {
                let pallet_id = operation.pallet_id;
                if self.defer_if_busy(pallet_id) {
                    return self.deferred(pallet_id);
                }
                match self.apply_operation(operation) {
                    Some(outcome) => ReconcileOutcome::Pallet { pallet_id, outcome },
                    None => {
                        self.schedule_refetch(pallet_id);
                        ReconcileOutcome::RefetchScheduled { pallet_id }
                    }
                }
            }
            PushEvent::BufferCellUpdated(cell) => {
                self.allocation.cells().upsert(cell.clone());
                self.publish(PalletEvent::BufferCellChanged { cell });
                ReconcileOutcome::ReferenceData
            }
            PushEvent::MachineStatus { machine_id, status } => {
                if !self.allocation.machines().set_status(machine_id, status) {
                    debug!(machine_id, "Status update for unknown machine");
                }
                self.publish(PalletEvent::MachineStatusChanged { machine_id, status });
                ReconcileOutcome::ReferenceData
            }
            PushEvent::Material { change, payload } => {
                self.publish(PalletEvent::CatalogChanged { change, payload });
                ReconcileOutcome::ReferenceData
            }
            PushEvent::RoomJoined { room } => {
                info!(room = %room, "Joined push room");
                ReconcileOutcome::Membership
            }
            PushEvent::RoomError { room, message } => {
                warn!(room = ?room, message = %message, "Push room error");
                ReconcileOutcome::Membership
            }
        }
    }

    /// Apply a server snapshot under the version policy, bypassing the in-flight
    /// check. Used for re-fetch results and confirmed command responses.
    pub fn apply_snapshot(&self, snapshot: PalletSnapshot) -> ApplyOutcome {
        let pallet_id = snapshot.pallet_id;
        let version = snapshot.version;
        let location = snapshot.location;
        let outcome = self.store.apply_snapshot(snapshot);

        if outcome.is_applied() {
            self.allocation.sync_location(pallet_id, location);
            if let Ok(pallet) = self.store.get(pallet_id) {
                self.publish(PalletEvent::PalletUpserted {
                    pallet,
                    origin: ChangeOrigin::Remote,
                });
            }
        }
        log_reconciliation(pallet_id, outcome_label(outcome), version);
        outcome
    }

    pub fn apply_deletion(&self, pallet_id: PalletId, version: Option<u64>) -> ApplyOutcome {
        let outcome = self.store.apply_deletion(pallet_id, version);
        if outcome.is_applied() {
            self.allocation.release(pallet_id);
            self.publish(PalletEvent::PalletRemoved {
                pallet_id,
                origin: ChangeOrigin::Remote,
            });
        }
        log_reconciliation(pallet_id, outcome_label(outcome), version);
        outcome
    }

    /// Replace the matching record on the pallet. `None` when the pallet or
    /// the operation is unknown locally and a full read is needed.
    fn apply_operation(&self, operation: Operation) -> Option<ApplyOutcome> {
        let pallet = self.store.get(operation.pallet_id).ok()?;

        if pallet.current_stage_progress.as_ref() == Some(&operation)
            || pallet.stage_history.contains(&operation)
        {
            return Some(ApplyOutcome::Skipped(SkipReason::Duplicate));
        }

        let matches_current = pallet
            .current_stage_progress
            .as_ref()
            .is_some_and(|current| current.operation_id == operation.operation_id);
        let history_index = pallet
            .stage_history
            .iter()
            .position(|op| op.operation_id == operation.operation_id);
        if !matches_current && history_index.is_none() {
            return None;
        }

        let pallet_id = operation.pallet_id;
        let updated = self
            .store
            .update(pallet_id, |pallet| {
                match history_index {
                    Some(index) if !matches_current => pallet.stage_history[index] = operation,
                    _ => pallet.current_stage_progress = Some(operation),
                }
                Ok(())
            })
            .ok()?;

        log_reconciliation(pallet_id, "operation_applied", updated.version);
        self.publish(PalletEvent::PalletUpserted {
            pallet: updated,
            origin: ChangeOrigin::Remote,
        });
        Some(ApplyOutcome::Applied)
    }

    /// Read the pallet from the service and apply the result
    pub async fn refetch(&self, pallet_id: PalletId) -> PalletResult<ApplyOutcome> {
        if self.in_flight.contains(pallet_id) {
            self.schedule_refetch(pallet_id);
            return Ok(ApplyOutcome::Skipped(SkipReason::PendingLocalMutation));
        }

        match self.service.fetch_pallet(pallet_id).await {
            Ok(Some(snapshot)) => Ok(self.apply_snapshot(snapshot)),
            Ok(None) => Ok(self.apply_deletion(pallet_id, None)),
            Err(e) => {
                let error: PalletError = classify_remote_error(e);
                log_error(
                    "reconciler",
                    "refetch",
                    &error.to_string(),
                    Some(&format!("pallet_id={pallet_id}")),
                );
                Err(error)
            }
        }
    }

    /// Spawn the reconciliation loop. It consumes `inbound` and the debouncer's
    /// fired ids until `inbound` closes. Can only be started once.
    pub fn spawn(self: &Arc<Self>, mut inbound: mpsc::Receiver<PushEvent>) -> PalletResult<JoinHandle<()>> {
        let mut refetches = self
            .refetches
            .lock()
            .take()
            .ok_or_else(|| PalletError::Internal("reconciler loop already started".into()))?;
        let reconciler = Arc::clone(self);

        Ok(tokio::spawn(async move {
            info!("Event reconciler started");
            loop {
                tokio::select! {
                    event = inbound.recv() => match event {
                        Some(event) => {
                            reconciler.handle(event);
                        }
                        None => break,
                    },
                    Some(pallet_id) = refetches.recv() => {
                        // Failures are logged in refetch; the next trigger retries
                        let _ = reconciler.refetch(pallet_id).await;
                    }
                }
            }
            info!("Event reconciler stopped");
        }))
    }

    fn defer_if_busy(&self, pallet_id: PalletId) -> bool {
        if self.in_flight.contains(pallet_id) {
            self.schedule_refetch(pallet_id);
            true
        } else {
            false
        }
    }

    fn deferred(&self, pallet_id: PalletId) -> ReconcileOutcome {
        log_reconciliation(pallet_id, "deferred", None);
        ReconcileOutcome::Pallet {
            pallet_id,
            outcome: ApplyOutcome::Skipped(SkipReason::PendingLocalMutation),
        }
    }

    fn publish(&self, event: PalletEvent) {
        let delivered = self.publisher.publish(event);
        trace!(delivered, "Published reconciliation event");
    }
}

fn outcome_label(outcome: ApplyOutcome) -> &'static str {
    match outcome {
        ApplyOutcome::Applied => "applied",
        ApplyOutcome::Skipped(SkipReason::Stale) => "skipped_stale",
        ApplyOutcome::Skipped(SkipReason::Duplicate) => "skipped_duplicate",
        ApplyOutcome::Skipped(SkipReason::PendingLocalMutation) => "deferred",
        ApplyOutcome::Skipped(SkipReason::ForeignPart) => "skipped_foreign_part",
    }
}

//! # Pallet Coordinator
//!
//! ## Architecture: Two-Phase Commands
//!
//! Every operator command runs the same way:
//!
//! 1. Claim the affected pallets in the [`InFlightRegistry`]. A second command
//!    against a claimed pallet is rejected with `OperationInProgress`.
//! 2. Validate locally and apply the change optimistically, keeping a
//!    checkpoint of everything touched.
//! 3. Send the command to the [`ProductionService`] under the configured
//!    command timeout.
//! 4. On success, fold the server's answer into the store and publish the
//!    stage transitions it confirmed. On failure, roll back to the checkpoint,
//!    classify the error and publish `CommandRejected`. Conflicts additionally
//!    schedule a debounced re-fetch.
//!
//! A rejected command never publishes `StageTransitioned`.
//!
//! The claim is released when the command resolves, whichever way it goes.
//! Push events for a claimed pallet are deferred by the [`EventReconciler`],
//! so server state that raced the command lands afterwards.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pallet_core::orchestration::{PalletCoordinator, StartWork};
//!
//! # async fn example(coordinator: PalletCoordinator) {
//! let resolution = coordinator
//!     .start_work(StartWork {
//!         pallet_id: 42,
//!         stage_id: 2,
//!         machine_id: 7,
//!         operator_id: Some(15),
//!     })
//!     .await;
//!
//! if let Some(error) = resolution.error() {
//!     eprintln!("{}: {}", error.code(), error);
//! }
//! # }
//! ```

use super::commands::{AssignToMachine, CompleteWork, MoveToBuffer, StageCompletion, StartWork};
use super::in_flight::{InFlightGuard, InFlightRegistry};
use super::resolution::CommandResolution;
use crate::allocation::{BufferAllocationManager, BufferCellRegistry, MachineRegistry};
use crate::config::PalletConfig;
use crate::defects::{DefectLedger, DefectOutcome, DefectReport};
use crate::error::{PalletError, PalletResult};
use crate::events::{ChangeOrigin, EventPublisher, PalletEvent};
use crate::logging::log_pallet_operation;
use crate::models::{
    DistributionRequest, MachineId, Operation, OperatorId, Pallet, PalletId, RedistributionPlan,
    StageId,
};
use crate::reconciliation::EventReconciler;
use crate::redistribution::{RedistributionOutcome, RedistributionPlanner};
use crate::remote::{
    classify_remote_error, AssignToMachineRequest, DefectPartsRequest, MoveToBufferRequest,
    ProcessingRequest, ProductionService, RedistributeRequest, RemoteResult,
};
use crate::state_machine::{
    OperationStatus, StageAdvance, StageEvent, StageStateMachine, StageTransition,
};
use crate::store::PalletStore;
use crate::validation::validate_operator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Entry point for operator commands against the local pallet mirror
#[derive(Clone)]
pub struct PalletCoordinator {
    store: Arc<PalletStore>,
    state_machine: StageStateMachine,
    allocation: BufferAllocationManager,
    ledger: Arc<DefectLedger>,
    planner: RedistributionPlanner,
    in_flight: InFlightRegistry,
    reconciler: Arc<EventReconciler>,
    service: Arc<dyn ProductionService>,
    publisher: EventPublisher,
    command_timeout: Duration,
}

impl std::fmt::Debug for PalletCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PalletCoordinator")
            .field("pallets", &self.store.len())
            .field("in_flight", &self.in_flight.len())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl PalletCoordinator {
    /// Wire every component around one store and one remote service
    pub fn new(
        store: Arc<PalletStore>,
        cells: Arc<BufferCellRegistry>,
        machines: Arc<MachineRegistry>,
        service: Arc<dyn ProductionService>,
        publisher: EventPublisher,
        config: &PalletConfig,
    ) -> Self {
        let allocation = BufferAllocationManager::new(Arc::clone(&store), cells, machines);
        let in_flight = InFlightRegistry::new();
        let reconciler = Arc::new(EventReconciler::new(
            Arc::clone(&store),
            allocation.clone(),
            in_flight.clone(),
            publisher.clone(),
            Arc::clone(&service),
            &config.reconciliation,
        ));

        Self {
            state_machine: StageStateMachine::new(publisher.clone())
                .with_predecessor_guard(config.stage_guard.enforce_locally)
                .with_deferred_events(true),
            planner: RedistributionPlanner::new(Arc::clone(&store)),
            ledger: Arc::new(DefectLedger::new()),
            store,
            allocation,
            in_flight,
            reconciler,
            service,
            publisher,
            command_timeout: config.remote.command_timeout(),
        }
    }

    pub fn store(&self) -> &Arc<PalletStore> {
        &self.store
    }

    pub fn allocation(&self) -> &BufferAllocationManager {
        &self.allocation
    }

    pub fn ledger(&self) -> &Arc<DefectLedger> {
        &self.ledger
    }

    pub fn planner(&self) -> &RedistributionPlanner {
        &self.planner
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    pub fn reconciler(&self) -> &Arc<EventReconciler> {
        &self.reconciler
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Begin processing the pallet's current stage on a machine
    #[instrument(skip(self), fields(pallet_id = command.pallet_id, stage_id = command.stage_id))]
    pub async fn start_work(&self, command: StartWork) -> CommandResolution<Operation> {
        const OPERATION: &str = "start_work";
        let pallet_id = command.pallet_id;
        let guard = match self.in_flight.acquire(pallet_id, OPERATION) {
            Ok(guard) => guard,
            Err(e) => return self.reject(OPERATION, pallet_id, None, e),
        };

        let (operator_id, from, started) = match self.prepare_start(&command) {
            Ok(prepared) => prepared,
            Err(e) => return self.reject(OPERATION, pallet_id, Some(&guard), e),
        };

        let checkpoint = self.store.checkpoint(&[pallet_id]);
        self.store.insert(started);

        let request = ProcessingRequest {
            pallet_id,
            machine_id: command.machine_id,
            operator_id,
            stage_id: command.stage_id,
        };
        match self.send(self.service.start_processing(request)).await {
            Ok(operation) => {
                let confirmed = self.store.update(pallet_id, |pallet| {
                    pallet.current_stage_progress = Some(operation.clone());
                    Ok(())
                });
                if let Ok(pallet) = confirmed {
                    let transition = StageTransition {
                        stage_id: operation.stage_id,
                        from,
                        to: operation.status,
                        event: StageEvent::Start,
                    };
                    self.state_machine.announce(&pallet, &transition);
                    self.publish_upsert(pallet);
                }
                self.confirmed(OPERATION, pallet_id, &guard);
                CommandResolution::Confirmed(operation)
            }
            Err(e) => {
                self.store.rollback(checkpoint);
                self.fail(OPERATION, pallet_id, &guard, e)
            }
        }
    }

    /// Complete the pallet's current stage and unlock its successor
    #[instrument(skip(self), fields(pallet_id = command.pallet_id, stage_id = command.stage_id))]
    pub async fn complete_work(&self, command: CompleteWork) -> CommandResolution<StageCompletion> {
        const OPERATION: &str = "complete_work";
        let pallet_id = command.pallet_id;
        let guard = match self.in_flight.acquire(pallet_id, OPERATION) {
            Ok(guard) => guard,
            Err(e) => return self.reject(OPERATION, pallet_id, None, e),
        };

        let (operator_id, machine_id, advance) = match self.prepare_completion(&command) {
            Ok(prepared) => prepared,
            Err(e) => return self.reject(OPERATION, pallet_id, Some(&guard), e),
        };

        let checkpoint = self.store.checkpoint(&[pallet_id]);
        let transitions = advance.transitions;
        self.store.insert(advance.pallet);

        let request = ProcessingRequest {
            pallet_id,
            machine_id,
            operator_id,
            stage_id: command.stage_id,
        };
        match self.send(self.service.complete_processing(request)).await {
            Ok(response) => {
                let pallet = self.confirm_snapshot(response.pallet);
                for transition in &transitions {
                    self.state_machine.announce(&pallet, transition);
                }
                let next_operation = pallet
                    .current_stage_progress
                    .clone()
                    .filter(|op| op.stage_id != response.operation.stage_id);
                self.confirmed(OPERATION, pallet_id, &guard);
                CommandResolution::Confirmed(StageCompletion {
                    pallet,
                    completed: response.operation,
                    next_operation,
                    next_step_name: response.next_step_name,
                })
            }
            Err(e) => {
                self.store.rollback(checkpoint);
                self.fail(OPERATION, pallet_id, &guard, e)
            }
        }
    }

    /// Park the pallet in a buffer cell
    #[instrument(skip(self), fields(pallet_id = command.pallet_id, cell_id = command.cell_id))]
    pub async fn move_to_buffer(&self, command: MoveToBuffer) -> CommandResolution<Pallet> {
        const OPERATION: &str = "move_to_buffer";
        let pallet_id = command.pallet_id;
        let guard = match self.in_flight.acquire(pallet_id, OPERATION) {
            Ok(guard) => guard,
            Err(e) => return self.reject(OPERATION, pallet_id, None, e),
        };

        let change = match self.allocation.assign_to_buffer(pallet_id, command.cell_id) {
            Ok(change) => change,
            Err(e) => return self.reject(OPERATION, pallet_id, Some(&guard), e),
        };

        let request = MoveToBufferRequest {
            pallet_id,
            buffer_cell_id: command.cell_id,
        };
        match self.send(self.service.move_to_buffer(request)).await {
            Ok(response) => {
                let pallet = self.confirm_snapshot(response.pallet);
                self.confirmed(OPERATION, pallet_id, &guard);
                CommandResolution::Confirmed(pallet)
            }
            Err(e) => {
                self.allocation.revert(change);
                self.fail(OPERATION, pallet_id, &guard, e)
            }
        }
    }

    /// Put the pallet on a machine segment, freeing any buffer cell it held
    #[instrument(skip(self), fields(pallet_id = command.pallet_id, machine_id = command.machine_id))]
    pub async fn assign_to_machine(&self, command: AssignToMachine) -> CommandResolution<Operation> {
        const OPERATION: &str = "assign_to_machine";
        let pallet_id = command.pallet_id;
        let guard = match self.in_flight.acquire(pallet_id, OPERATION) {
            Ok(guard) => guard,
            Err(e) => return self.reject(OPERATION, pallet_id, None, e),
        };

        let change = match self.allocation.assign_to_machine(
            pallet_id,
            command.machine_id,
            Some(command.segment_id),
        ) {
            Ok(change) => change,
            Err(e) => return self.reject(OPERATION, pallet_id, Some(&guard), e),
        };

        let request = AssignToMachineRequest {
            pallet_id,
            machine_id: command.machine_id,
            segment_id: command.segment_id,
            operator_id: command.operator_id,
        };
        match self.send(self.service.assign_to_machine(request)).await {
            Ok(response) => {
                let operation = response.operation;
                let confirmed = self.store.update(pallet_id, |pallet| {
                    if operation.pallet_id == pallet_id {
                        pallet.current_stage_progress = Some(operation.clone());
                    }
                    Ok(())
                });
                if let Ok(pallet) = confirmed {
                    self.publish_upsert(pallet);
                }
                self.confirmed(OPERATION, pallet_id, &guard);
                CommandResolution::Confirmed(operation)
            }
            Err(e) => {
                self.allocation.revert(change);
                self.fail(OPERATION, pallet_id, &guard, e)
            }
        }
    }

    /// Remove defective parts from a pallet. A pallet reduced to zero is deleted.
    #[instrument(skip(self), fields(pallet_id = report.pallet_id, quantity = report.quantity))]
    pub async fn report_defect(&self, report: DefectReport) -> CommandResolution<DefectOutcome> {
        const OPERATION: &str = "report_defect";
        let pallet_id = report.pallet_id;
        let guard = match self.in_flight.acquire(pallet_id, OPERATION) {
            Ok(guard) => guard,
            Err(e) => return self.reject(OPERATION, pallet_id, None, e),
        };

        let checkpoint = self.store.checkpoint(&[pallet_id]);
        let (stage_id, outcome) = match self.prepare_defect(&report) {
            Ok(prepared) => prepared,
            Err(e) => return self.reject(OPERATION, pallet_id, Some(&guard), e),
        };

        let request = DefectPartsRequest {
            pallet_id,
            quantity: report.quantity,
            reporter_id: report.reporter_id,
            stage_id,
            description: outcome.record.description.clone(),
            machine_id: report.machine_id,
        };
        match self.send(self.service.defect_parts(request)).await {
            Ok(response) => {
                let mut outcome = outcome;
                if response.reclamation.pallet_deleted {
                    self.confirm_deletion(pallet_id, checkpoint.version_of(pallet_id));
                } else if response.pallet.new_quantity != outcome.new_quantity {
                    warn!(
                        pallet_id,
                        before = outcome.previous.quantity,
                        local = outcome.new_quantity,
                        remote = response.pallet.new_quantity,
                        "Defect quantity diverged from server, re-fetching"
                    );
                    self.reconciler.schedule_refetch(pallet_id);
                }
                outcome.new_quantity = response.pallet.new_quantity;
                outcome.pallet_deleted = response.reclamation.pallet_deleted;

                self.publisher.publish(PalletEvent::DefectRecorded {
                    record: outcome.record.clone(),
                    pallet_deleted: outcome.pallet_deleted,
                });
                self.confirmed(OPERATION, pallet_id, &guard);
                CommandResolution::Confirmed(outcome)
            }
            Err(e) => {
                self.ledger.retract(outcome.record.record_id);
                self.store.rollback(checkpoint);
                self.fail(OPERATION, pallet_id, &guard, e)
            }
        }
    }

    /// Split a pallet's quantity across existing and new pallets
    #[instrument(skip(self, plan), fields(pallet_id = plan.source_pallet_id))]
    pub async fn redistribute(&self, plan: RedistributionPlan) -> CommandResolution<RedistributionOutcome> {
        const OPERATION: &str = "redistribute";
        let source_id = plan.source_pallet_id;
        let mut claimed: Vec<PalletId> = vec![source_id];
        claimed.extend(plan.existing_targets());

        let guard = match self.in_flight.acquire_many(&claimed, OPERATION) {
            Ok(guard) => guard,
            Err(e) => return self.reject(OPERATION, source_id, None, e),
        };

        let mut checkpoint = self.store.checkpoint(&claimed);
        let outcome = match self.planner.redistribute(&plan) {
            Ok(outcome) => outcome,
            Err(e) => return self.reject(OPERATION, source_id, Some(&guard), e),
        };
        for created in &outcome.created {
            checkpoint.track_created(created.pallet_id);
        }

        let request = RedistributeRequest {
            source_pallet_id: source_id,
            distributions: plan.distributions.iter().map(DistributionRequest::from).collect(),
            machine_id: plan.machine_id,
        };
        match self.send(self.service.redistribute_parts(request)).await {
            Ok(response) => {
                let unmatched = self
                    .planner
                    .confirm_created(&outcome.created, response.created_pallets);
                for tentative_id in unmatched {
                    warn!(pallet_id = tentative_id, "Created pallet missing from server response");
                }
                for updated in response.updated_pallets {
                    self.confirm_snapshot(updated);
                }

                if response.source_pallet_deleted {
                    self.confirm_deletion(source_id, checkpoint.version_of(source_id));
                } else if outcome.source_deleted {
                    self.reconciler.schedule_refetch(source_id);
                }

                self.publisher.publish(PalletEvent::Redistributed {
                    source_pallet_id: source_id,
                    source_deleted: response.source_pallet_deleted,
                    created: outcome.created.iter().map(|p| p.pallet_id).collect(),
                    updated: outcome.updated.iter().map(|p| p.pallet_id).collect(),
                });
                self.confirmed(OPERATION, source_id, &guard);
                CommandResolution::Confirmed(outcome)
            }
            Err(e) => {
                self.store.rollback(checkpoint);
                self.fail(OPERATION, source_id, &guard, e)
            }
        }
    }

    fn prepare_start(&self, command: &StartWork) -> PalletResult<(OperatorId, OperationStatus, Pallet)> {
        let operator_id = validate_operator(command.operator_id)?;
        let pallet = self.store.get(command.pallet_id)?;
        let from = pallet
            .current_stage_progress
            .as_ref()
            .map_or(OperationStatus::Pending, |op| op.status);
        let started = self.state_machine.start_work(
            &pallet,
            self.store.route(),
            command.stage_id,
            Some(command.machine_id),
            Some(operator_id),
        )?;
        Ok((operator_id, from, started))
    }

    fn prepare_completion(
        &self,
        command: &CompleteWork,
    ) -> PalletResult<(OperatorId, MachineId, StageAdvance)> {
        let operator_id = validate_operator(command.operator_id)?;
        let pallet = self.store.get(command.pallet_id)?;
        let machine_id = command
            .machine_id
            .or_else(|| pallet.current_stage_progress.as_ref().and_then(|op| op.machine_id))
            .or_else(|| pallet.location.machine_id())
            .ok_or_else(|| PalletError::validation("Machine id is required to complete work"))?;
        let advance = self.state_machine.complete_work(
            &pallet,
            self.store.route(),
            command.stage_id,
            Some(operator_id),
            self.store.next_tentative_id(),
        )?;
        Ok((operator_id, machine_id, advance))
    }

    /// Applies the defect to the store and ledger
    fn prepare_defect(&self, report: &DefectReport) -> PalletResult<(StageId, DefectOutcome)> {
        let pallet = self.store.get(report.pallet_id)?;
        let stage_id = report
            .stage_id
            .or_else(|| pallet.current_stage_id())
            .ok_or_else(|| PalletError::validation("Stage is required to report a defect"))?;
        let outcome = self.ledger.report_defect(&self.store, report.clone())?;
        Ok((stage_id, outcome))
    }

    /// Await a remote call under the command timeout and classify any failure
    async fn send<T, F>(&self, call: F) -> PalletResult<T>
    where
        F: Future<Output = RemoteResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify_remote_error(e)),
            Err(_) => Err(PalletError::transport(format!(
                "Command timed out after {}ms",
                self.command_timeout.as_millis()
            ))),
        }
    }

    /// Fold a server-confirmed snapshot into the store. History the server
    /// did not send is kept from the local copy.
    fn confirm_snapshot(&self, mut confirmed: Pallet) -> Pallet {
        if let Ok(local) = self.store.get(confirmed.pallet_id) {
            confirmed.inherit_history(&local);
        }
        self.store.insert(confirmed.clone());
        self.allocation.sync_location(confirmed.pallet_id, confirmed.location);
        self.publish_upsert(confirmed.clone());
        confirmed
    }

    /// `version` is the server version the pallet had before the command, so a
    /// late push of that state cannot bring it back
    fn confirm_deletion(&self, pallet_id: PalletId, version: Option<u64>) {
        self.store.apply_deletion(pallet_id, version);
        if let Some(cell_id) = self.allocation.release(pallet_id) {
            debug!(pallet_id, cell_id, "Released cell of deleted pallet");
        }
        self.publisher.publish(PalletEvent::PalletRemoved {
            pallet_id,
            origin: ChangeOrigin::Local,
        });
    }

    fn publish_upsert(&self, pallet: Pallet) {
        self.publisher.publish(PalletEvent::PalletUpserted {
            pallet,
            origin: ChangeOrigin::Local,
        });
    }

    fn confirmed(&self, operation: &str, pallet_id: PalletId, guard: &InFlightGuard) {
        log_pallet_operation(
            operation,
            pallet_id,
            Some(&guard.command_id().to_string()),
            "confirmed",
            None,
        );
    }

    /// Refused before anything was sent; nothing to roll back
    fn reject<T>(
        &self,
        operation: &str,
        pallet_id: PalletId,
        guard: Option<&InFlightGuard>,
        error: PalletError,
    ) -> CommandResolution<T> {
        let command_id = guard.map(|g| g.command_id().to_string());
        self.resolve_failure(operation, pallet_id, command_id.as_deref(), error)
    }

    /// Failure after the remote call; local state was already rolled back
    fn fail<T>(
        &self,
        operation: &str,
        pallet_id: PalletId,
        guard: &InFlightGuard,
        error: PalletError,
    ) -> CommandResolution<T> {
        if error.requires_refetch() {
            self.reconciler.schedule_refetch(pallet_id);
        }
        let command_id = guard.command_id().to_string();
        self.resolve_failure(operation, pallet_id, Some(&command_id), error)
    }

    fn resolve_failure<T>(
        &self,
        operation: &str,
        pallet_id: PalletId,
        command_id: Option<&str>,
        error: PalletError,
    ) -> CommandResolution<T> {
        log_pallet_operation(
            operation,
            pallet_id,
            command_id,
            error.code(),
            Some(&error.to_string()),
        );
        self.publisher.publish(PalletEvent::CommandRejected {
            pallet_id,
            kind: error.kind(),
            code: error.code().to_string(),
            message: error.to_string(),
        });
        CommandResolution::failed(error)
    }
}

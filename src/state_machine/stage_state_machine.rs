use super::{
    actions::{LogTransitionAction, PublishTransitionEventAction, StageTransition, StateAction},
    errors::{StateMachineError, StateMachineResult},
    events::StageEvent,
    guards::{
        BufferLocationAssignedGuard, OperatorPresentGuard, PredecessorCompletedGuard, StageContext,
        StateGuard,
    },
    states::OperationStatus,
};
use crate::events::EventPublisher;
use crate::models::{MachineId, Operation, OperationId, OperatorId, Pallet, Route, StageId};
use chrono::Utc;

/// Result of completing a stage
#[derive(Debug, Clone, PartialEq)]
pub struct StageAdvance {
    /// Pallet with its current operation replaced
    pub pallet: Pallet,
    /// The record that was just completed
    pub completed: Operation,
    /// Successor stage record, `None` when the route is exhausted
    pub next_operation: Option<Operation>,
    /// Transitions applied, in order: the completion, then the successor's unlock
    pub transitions: Vec<StageTransition>,
}

/// Governs legal status transitions of a pallet's current route-stage operation.
///
/// The machine is pure with respect to the store: it takes a pallet snapshot and
/// returns the transitioned copy, leaving commit/rollback to the caller.
/// A machine with deferred events only logs transitions; the caller announces
/// them once the change is committed.
#[derive(Debug, Clone)]
pub struct StageStateMachine {
    event_publisher: EventPublisher,
    enforce_predecessor_guard: bool,
    defer_events: bool,
}

impl StageStateMachine {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self {
            event_publisher,
            enforce_predecessor_guard: true,
            defer_events: false,
        }
    }

    /// Toggle the local predecessor-completion check on `Start`
    pub fn with_predecessor_guard(mut self, enforce: bool) -> Self {
        self.enforce_predecessor_guard = enforce;
        self
    }

    /// Leave `StageTransitioned` publication to [`Self::announce`]
    pub fn with_deferred_events(mut self, defer: bool) -> Self {
        self.defer_events = defer;
        self
    }

    /// Publish a transition that was applied with deferred events
    pub fn announce(&self, pallet: &Pallet, transition: &StageTransition) {
        PublishTransitionEventAction::new(self.event_publisher.clone()).execute(pallet, transition);
    }

    /// Status of a freshly created record: the first stage is immediately
    /// eligible, later stages wait for their predecessor
    pub fn initial_status(route: &Route, stage_id: StageId) -> OperationStatus {
        if route.is_first_stage(stage_id) {
            OperationStatus::Pending
        } else {
            OperationStatus::NotProcessed
        }
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        &self,
        current_state: OperationStatus,
        event: &StageEvent,
    ) -> StateMachineResult<OperationStatus> {
        let target = match (current_state, event) {
            (OperationStatus::NotProcessed, StageEvent::Unlock) => OperationStatus::Pending,

            (from, StageEvent::Start) if from.can_start() => OperationStatus::InProgress,

            (OperationStatus::InProgress, StageEvent::Complete) => OperationStatus::Completed,
            (OperationStatus::InProgress, StageEvent::MoveToBuffer) => OperationStatus::Buffered,

            (OperationStatus::InProgress | OperationStatus::Pending, StageEvent::Fail(_)) => {
                OperationStatus::Failed
            }

            (OperationStatus::Failed, StageEvent::Reset) => OperationStatus::Pending,

            (from_state, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }

    /// Check guard conditions for the transition
    fn check_guards(
        &self,
        ctx: &StageContext<'_>,
        target_state: OperationStatus,
        event: &StageEvent,
    ) -> StateMachineResult<()> {
        match (target_state, event) {
            (OperationStatus::InProgress, StageEvent::Start) => {
                if self.enforce_predecessor_guard {
                    PredecessorCompletedGuard.check(ctx)?;
                }
            }

            (OperationStatus::Pending, StageEvent::Unlock) => {
                PredecessorCompletedGuard.check(ctx)?;
            }

            (OperationStatus::Completed, StageEvent::Complete) => {
                OperatorPresentGuard.check(ctx)?;
                BufferLocationAssignedGuard.check(ctx)?;
            }

            _ => {}
        }

        Ok(())
    }

    /// Execute actions after successful transition
    fn execute_actions(&self, pallet: &Pallet, transition: &StageTransition) {
        LogTransitionAction.execute(pallet, transition);
        if !self.defer_events {
            self.announce(pallet, transition);
        }
    }

    /// Attempt to transition the pallet's current operation
    pub fn transition(
        &self,
        pallet: &Pallet,
        route: &Route,
        event: StageEvent,
        operator_id: Option<OperatorId>,
    ) -> StateMachineResult<Pallet> {
        self.apply(pallet, route, event, operator_id, |_| {})
    }

    fn apply(
        &self,
        pallet: &Pallet,
        route: &Route,
        event: StageEvent,
        operator_id: Option<OperatorId>,
        stamp: impl FnOnce(&mut Operation),
    ) -> StateMachineResult<Pallet> {
        let current = pallet
            .current_stage_progress
            .as_ref()
            .ok_or_else(|| StateMachineError::OperationNotFound {
                pallet_id: pallet.pallet_id,
                stage: "current".to_string(),
            })?;

        let target = self.determine_target_state(current.status, &event)?;
        let ctx = StageContext {
            pallet,
            route,
            operator_id,
        };
        self.check_guards(&ctx, target, &event)?;

        let mut next = current.with_status(target, Utc::now());
        if operator_id.is_some() {
            next.operator_id = operator_id;
        }
        stamp(&mut next);

        let transition = StageTransition {
            stage_id: next.stage_id,
            from: current.status,
            to: target,
            event,
        };

        let mut updated = pallet.clone();
        updated.current_stage_progress = Some(next);
        self.execute_actions(&updated, &transition);

        Ok(updated)
    }

    fn ensure_stage(&self, pallet: &Pallet, route: &Route, stage_id: StageId) -> StateMachineResult<()> {
        match pallet.current_stage_id() {
            Some(current) if current == stage_id => Ok(()),
            _ => Err(StateMachineError::OperationNotFound {
                pallet_id: pallet.pallet_id,
                stage: route.stage_name(stage_id),
            }),
        }
    }

    /// Move the pallet's operation for `stage_id` to `IN_PROGRESS` on `machine_id`
    pub fn start_work(
        &self,
        pallet: &Pallet,
        route: &Route,
        stage_id: StageId,
        machine_id: Option<MachineId>,
        operator_id: Option<OperatorId>,
    ) -> StateMachineResult<Pallet> {
        self.ensure_stage(pallet, route, stage_id)?;
        self.apply(pallet, route, StageEvent::Start, operator_id, |op| {
            if machine_id.is_some() {
                op.machine_id = machine_id;
            }
        })
    }

    /// Complete the pallet's operation for `stage_id` and install the successor
    /// stage's record, already unlocked
    pub fn complete_work(
        &self,
        pallet: &Pallet,
        route: &Route,
        stage_id: StageId,
        operator_id: Option<OperatorId>,
        next_operation_id: OperationId,
    ) -> StateMachineResult<StageAdvance> {
        self.ensure_stage(pallet, route, stage_id)?;
        if operator_id.is_none() {
            return Err(super::errors::GuardError::OperatorRequired.into());
        }

        let from = pallet
            .current_stage_progress
            .as_ref()
            .map_or(OperationStatus::InProgress, |op| op.status);
        let mut completed_pallet = self.transition(pallet, route, StageEvent::Complete, operator_id)?;
        let completed = completed_pallet
            .current_stage_progress
            .clone()
            .ok_or_else(|| StateMachineError::OperationNotFound {
                pallet_id: pallet.pallet_id,
                stage: route.stage_name(stage_id),
            })?;

        let next_operation = route.successor_of(stage_id).map(|next_stage| {
            Operation::new(
                next_operation_id,
                pallet.pallet_id,
                next_stage.stage_id,
                OperationStatus::Pending,
            )
        });

        completed_pallet.advance_to(completed.clone(), next_operation.clone());

        let mut transitions = vec![StageTransition {
            stage_id,
            from,
            to: completed.status,
            event: StageEvent::Complete,
        }];
        if let Some(next) = &next_operation {
            let unlock = StageTransition {
                stage_id: next.stage_id,
                from: OperationStatus::NotProcessed,
                to: OperationStatus::Pending,
                event: StageEvent::Unlock,
            };
            self.execute_actions(&completed_pallet, &unlock);
            transitions.push(unlock);
        }

        Ok(StageAdvance {
            pallet: completed_pallet,
            completed,
            next_operation,
            transitions,
        })
    }
}

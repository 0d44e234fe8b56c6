use super::events::StageEvent;
use super::states::OperationStatus;
use crate::events::{EventPublisher, PalletEvent};
use crate::logging::log_stage_transition;
use crate::models::{Pallet, StageId};

/// A transition that has just been applied to a pallet's current operation
#[derive(Debug, Clone, PartialEq)]
pub struct StageTransition {
    pub stage_id: StageId,
    pub from: OperationStatus,
    pub to: OperationStatus,
    pub event: StageEvent,
}

/// Trait for implementing state transition actions
pub trait StateAction {
    /// Execute the action
    fn execute(&self, pallet: &Pallet, transition: &StageTransition);

    /// Get a description of this action for logging
    fn description(&self) -> &'static str;
}

/// Action to publish lifecycle events when state transitions occur
pub struct PublishTransitionEventAction {
    event_publisher: EventPublisher,
}

impl PublishTransitionEventAction {
    pub fn new(event_publisher: EventPublisher) -> Self {
        Self { event_publisher }
    }
}

impl StateAction for PublishTransitionEventAction {
    fn execute(&self, pallet: &Pallet, transition: &StageTransition) {
        self.event_publisher.publish(PalletEvent::StageTransitioned {
            pallet_id: pallet.pallet_id,
            stage_id: transition.stage_id,
            from: transition.from,
            to: transition.to,
        });
    }

    fn description(&self) -> &'static str {
        "Publish lifecycle event for stage transition"
    }
}

/// Action to emit a structured log record for every transition
pub struct LogTransitionAction;

impl StateAction for LogTransitionAction {
    fn execute(&self, pallet: &Pallet, transition: &StageTransition) {
        log_stage_transition(
            pallet.pallet_id,
            transition.stage_id,
            &transition.from.to_string(),
            &transition.to.to_string(),
            transition.event.event_type(),
        );
        if let Some(reason) = transition.event.error_message() {
            tracing::warn!(pallet_id = pallet.pallet_id, reason, "Stage operation failed");
        }
    }

    fn description(&self) -> &'static str {
        "Log stage transition"
    }
}

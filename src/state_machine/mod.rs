// State machine module for route-stage progression
//
// Each pallet carries one current Operation per route stage. The machine decides
// which status changes are legal, checks guards against the pallet and its route,
// and runs post-transition actions (event publication and structured logging).

pub mod actions;
pub mod errors;
pub mod events;
pub mod guards;
pub mod stage_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use errors::{GuardError, StateMachineError, StateMachineResult};
pub use events::StageEvent;
pub use stage_state_machine::{StageAdvance, StageStateMachine};
pub use states::OperationStatus;

// Common traits and utilities
pub use actions::{StageTransition, StateAction};
pub use guards::{StageContext, StateGuard};

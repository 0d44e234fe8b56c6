use crate::error::PalletError;
use crate::models::PalletId;
use thiserror::Error;

pub type StateMachineResult<T> = std::result::Result<T, StateMachineError>;
pub type GuardResult<T> = std::result::Result<T, GuardError>;

/// Error types for stage progression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Guard condition failed: {0}")]
    GuardFailed(#[from] GuardError),

    #[error("Invalid state transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("No active operation for stage {stage} on pallet {pallet_id}")]
    OperationNotFound { pallet_id: PalletId, stage: String },
}

/// Specific error type for guard condition failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error("Previous stage not completed: {stage_name}")]
    PredecessorNotCompleted { stage_name: String },

    #[error("A buffer cell must be selected before completing work")]
    BufferLocationRequired,

    #[error("Operator id is required")]
    OperatorRequired,
}

impl From<StateMachineError> for PalletError {
    fn from(err: StateMachineError) -> Self {
        match err {
            StateMachineError::GuardFailed(GuardError::PredecessorNotCompleted { stage_name }) => {
                PalletError::StageGuardViolation { stage_name }
            }
            StateMachineError::GuardFailed(GuardError::BufferLocationRequired) => {
                PalletError::BufferLocationRequired
            }
            StateMachineError::GuardFailed(GuardError::OperatorRequired) => {
                PalletError::OperatorRequired
            }
            StateMachineError::InvalidTransition { from, event } => {
                PalletError::InvalidTransition { from, event }
            }
            StateMachineError::OperationNotFound { pallet_id, stage } => {
                PalletError::OperationNotFound { pallet_id, stage }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_error_maps_to_stage_guard_violation() {
        let err: StateMachineError = GuardError::PredecessorNotCompleted {
            stage_name: "Раскрой".to_string(),
        }
        .into();
        assert_eq!(
            PalletError::from(err),
            PalletError::StageGuardViolation {
                stage_name: "Раскрой".to_string()
            }
        );
    }

    #[test]
    fn test_error_messages() {
        let err = StateMachineError::InvalidTransition {
            from: "COMPLETED".to_string(),
            event: "start".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid state transition from COMPLETED on start");
    }
}

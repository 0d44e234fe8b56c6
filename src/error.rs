//! # Pallet Core Errors
//!
//! Crate-wide error type. Every variant maps onto a stable [`ErrorKind`] and a
//! snake_case [`PalletError::code`] so the presentation layer can pattern-match
//! known cases without re-implementing business rules.

use crate::models::{CellId, MachineId, PalletId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse error taxonomy shared with callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input rejected before any network call
    Validation,
    /// A stage-order, capacity or mutual-exclusion rule was broken
    GuardViolation,
    /// Concurrent mutation or stale version
    Conflict,
    /// Timeout or disconnect
    Transport,
    /// Referenced entity is not in the local mirror
    NotFound,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::GuardViolation => write!(f, "guard_violation"),
            Self::Conflict => write!(f, "conflict"),
            Self::Transport => write!(f, "transport"),
            Self::NotFound => write!(f, "not_found"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PalletError {
    #[error("Pallet {pallet_id} not found")]
    PalletNotFound { pallet_id: PalletId },

    #[error("No active operation for stage {stage} on pallet {pallet_id}")]
    OperationNotFound { pallet_id: PalletId, stage: String },

    #[error("Operator id is required")]
    OperatorRequired,

    #[error("Previous stage not completed: {stage_name}")]
    StageGuardViolation { stage_name: String },

    #[error("Invalid stage transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("A buffer cell must be selected before completing work")]
    BufferLocationRequired,

    #[error("Buffer cell {cell_code} is unavailable ({status})")]
    CellUnavailable {
        cell_id: CellId,
        cell_code: String,
        status: String,
    },

    #[error("Buffer cell {cell_id} not found")]
    CellNotFound { cell_id: CellId },

    #[error("Machine {machine_id} not found")]
    MachineNotFound { machine_id: MachineId },

    #[error("Machine {machine_name} is unavailable ({status})")]
    MachineUnavailable {
        machine_name: String,
        status: String,
    },

    #[error("Pallet {pallet_id} is in progress on machine {machine_name}")]
    PalletBusy {
        pallet_id: PalletId,
        machine_name: String,
    },

    #[error(
        "Insufficient quantity on pallet {pallet_id}: requested {requested}, available {available}"
    )]
    InsufficientQuantity {
        pallet_id: PalletId,
        requested: u32,
        available: u32,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Another command is in progress for pallet {pallet_id}")]
    OperationInProgress { pallet_id: PalletId },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Remote rejection, message kept verbatim. `code` names the known case
    /// the text was matched to, or `remote_rejected`.
    #[error("{message}")]
    Rejected {
        kind: ErrorKind,
        code: &'static str,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OperatorRequired
            | Self::Validation(_)
            | Self::InsufficientQuantity { .. }
            | Self::Configuration(_) => ErrorKind::Validation,
            Self::StageGuardViolation { .. }
            | Self::InvalidTransition { .. }
            | Self::BufferLocationRequired
            | Self::CellUnavailable { .. }
            | Self::MachineUnavailable { .. }
            | Self::PalletBusy { .. } => ErrorKind::GuardViolation,
            Self::OperationInProgress { .. } | Self::Conflict(_) => ErrorKind::Conflict,
            Self::Transport(_) => ErrorKind::Transport,
            Self::PalletNotFound { .. }
            | Self::OperationNotFound { .. }
            | Self::CellNotFound { .. }
            | Self::MachineNotFound { .. } => ErrorKind::NotFound,
            Self::Rejected { kind, .. } => *kind,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable identifier for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::PalletNotFound { .. } => "pallet_not_found",
            Self::OperationNotFound { .. } => "operation_not_found",
            Self::OperatorRequired => "operator_required",
            Self::StageGuardViolation { .. } => "stage_guard_violation",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::BufferLocationRequired => "buffer_location_required",
            Self::CellUnavailable { .. } => "cell_unavailable",
            Self::CellNotFound { .. } => "cell_not_found",
            Self::MachineNotFound { .. } => "machine_not_found",
            Self::MachineUnavailable { .. } => "machine_unavailable",
            Self::PalletBusy { .. } => "pallet_busy",
            Self::InsufficientQuantity { .. } => "insufficient_quantity",
            Self::Validation(_) => "validation_error",
            Self::OperationInProgress { .. } => "operation_in_progress",
            Self::Conflict(_) => "conflict",
            Self::Rejected { code, .. } => *code,
            Self::Transport(_) => "transport_error",
            Self::Configuration(_) => "configuration_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Only transport failures are worth retrying through the backoff policy
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Conflicts are resolved by re-fetching server state, never by blind retry
    pub fn requires_refetch(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

pub type PalletResult<T> = std::result::Result<T, PalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PalletError::StageGuardViolation {
                stage_name: "Раскрой".to_string()
            }
            .kind(),
            ErrorKind::GuardViolation
        );
        assert_eq!(
            PalletError::OperationInProgress { pallet_id: 1 }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(PalletError::OperatorRequired.kind(), ErrorKind::Validation);
        assert_eq!(
            PalletError::PalletNotFound { pallet_id: 3 }.kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_retry_and_refetch_classification() {
        assert!(PalletError::transport("socket closed").is_retryable());
        assert!(!PalletError::validation("bad quantity").is_retryable());
        assert!(PalletError::Conflict("stale version".to_string()).requires_refetch());
        assert!(!PalletError::transport("timeout").requires_refetch());
    }

    #[test]
    fn test_stage_guard_message_carries_stage_name() {
        let err = PalletError::StageGuardViolation {
            stage_name: "Кромкооблицовка".to_string(),
        };
        assert_eq!(err.to_string(), "Previous stage not completed: Кромкооблицовка");
        assert_eq!(err.code(), "stage_guard_violation");
    }
}

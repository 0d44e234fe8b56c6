//! # Remote Error Classification
//!
//! Maps [`RemoteError`]s onto the crate taxonomy. The remote message text is
//! always preserved; known phrases only select the `kind` and `code`.

use super::service::RemoteError;
use crate::constants::remote_messages;
use crate::error::{ErrorKind, PalletError};

fn mentions(message_lower: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| message_lower.contains(phrase))
}

/// Convert a remote failure into a [`PalletError`]
pub fn classify_remote_error(error: RemoteError) -> PalletError {
    match error {
        RemoteError::Transport(message) => PalletError::Transport(message),
        RemoteError::Timeout => PalletError::transport("remote call timed out"),
        RemoteError::Decode(message) => PalletError::Internal(format!("invalid remote response: {message}")),
        RemoteError::Rejected { status, message } => classify_rejection(status, message),
    }
}

fn classify_rejection(status: u16, message: String) -> PalletError {
    let lower = message.to_lowercase();

    if mentions(&lower, remote_messages::PREVIOUS_STAGE_NOT_COMPLETED) {
        return rejected(ErrorKind::GuardViolation, "stage_guard_violation", message);
    }
    if mentions(&lower, remote_messages::CELL_OCCUPIED) {
        return rejected(ErrorKind::GuardViolation, "cell_unavailable", message);
    }
    if mentions(&lower, remote_messages::INSUFFICIENT_QUANTITY) {
        return rejected(ErrorKind::Validation, "insufficient_quantity", message);
    }
    if mentions(&lower, remote_messages::SELECT_BUFFER_ADDRESS) {
        return rejected(ErrorKind::GuardViolation, "buffer_location_required", message);
    }

    match status {
        400 | 422 => rejected(ErrorKind::Validation, "validation_error", message),
        403 => rejected(ErrorKind::GuardViolation, "remote_rejected", message),
        404 => rejected(ErrorKind::NotFound, "not_found", message),
        409 | 412 => rejected(ErrorKind::Conflict, "conflict", message),
        408 | 502 | 503 | 504 => PalletError::Transport(message),
        _ => rejected(ErrorKind::Internal, "remote_rejected", message),
    }
}

fn rejected(kind: ErrorKind, code: &'static str, message: String) -> PalletError {
    PalletError::Rejected {
        kind,
        code,
        message,
    }
}

//! Input validation for operator commands
//!
//! Checks that run before any state is touched or any network call is made.
//! Failures are always [`PalletError::Validation`] or the dedicated
//! validation-kind variants, never retried.

use crate::error::{PalletError, PalletResult};
use crate::models::{OperatorId, PalletId};

/// Maximum length of a pallet display name, in characters
const MAX_PALLET_NAME_LENGTH: usize = 100;

/// Maximum length of a defect description, in characters
const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// Quantity must be a positive whole number of parts
pub fn validate_quantity(quantity: u32) -> PalletResult<()> {
    if quantity == 0 {
        return Err(PalletError::validation("Quantity must be greater than zero"));
    }
    Ok(())
}

/// Quantity must be positive and not exceed what the pallet holds
pub fn validate_quantity_available(pallet_id: PalletId, requested: u32, available: u32) -> PalletResult<()> {
    validate_quantity(requested)?;
    if requested > available {
        return Err(PalletError::InsufficientQuantity {
            pallet_id,
            requested,
            available,
        });
    }
    Ok(())
}

/// Returns the trimmed name
pub fn validate_pallet_name(name: &str) -> PalletResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PalletError::validation("Pallet name must not be blank"));
    }
    if trimmed.chars().count() > MAX_PALLET_NAME_LENGTH {
        return Err(PalletError::validation(format!(
            "Pallet name too long: {} characters (max: {MAX_PALLET_NAME_LENGTH})",
            trimmed.chars().count()
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(PalletError::validation(
            "Pallet name contains control characters",
        ));
    }
    Ok(trimmed)
}

pub fn validate_operator(operator_id: Option<OperatorId>) -> PalletResult<OperatorId> {
    match operator_id {
        Some(id) if id > 0 => Ok(id),
        _ => Err(PalletError::OperatorRequired),
    }
}

/// Blank descriptions are normalized to `None`
pub fn validate_description(description: Option<&str>) -> PalletResult<Option<String>> {
    let Some(text) = description.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(PalletError::validation(format!(
            "Description too long (max: {MAX_DESCRIPTION_LENGTH} characters)"
        )));
    }
    Ok(Some(text.to_string()))
}

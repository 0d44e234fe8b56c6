use super::{MachineId, PalletId};
use crate::error::{PalletError, PalletResult};
use serde::{Deserialize, Serialize};

/// Where a share of the source pallet goes: an existing pallet XOR a new one
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DistributionTarget {
    #[serde(rename_all = "camelCase")]
    ExistingPallet { pallet_id: PalletId },
    #[serde(rename_all = "camelCase")]
    NewPallet { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub target: DistributionTarget,
    pub quantity: u32,
}

impl Distribution {
    pub fn to_existing(pallet_id: PalletId, quantity: u32) -> Self {
        Self {
            target: DistributionTarget::ExistingPallet { pallet_id },
            quantity,
        }
    }

    pub fn to_new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            target: DistributionTarget::NewPallet { name: name.into() },
            quantity,
        }
    }
}

/// Wire shape used by the remote service, where both target fields are optional
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pallet_id: Option<PalletId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_pallet_name: Option<String>,
    pub quantity: u32,
}

impl TryFrom<DistributionRequest> for Distribution {
    type Error = PalletError;

    fn try_from(request: DistributionRequest) -> PalletResult<Self> {
        let target = match (request.target_pallet_id, request.new_pallet_name) {
            (Some(pallet_id), None) => DistributionTarget::ExistingPallet { pallet_id },
            (None, Some(name)) => DistributionTarget::NewPallet { name },
            (Some(_), Some(_)) => {
                return Err(PalletError::validation(
                    "distribution must target either an existing pallet or a new pallet name, not both",
                ))
            }
            (None, None) => {
                return Err(PalletError::validation(
                    "distribution must name a target pallet or a new pallet name",
                ))
            }
        };
        Ok(Self {
            target,
            quantity: request.quantity,
        })
    }
}

impl From<&Distribution> for DistributionRequest {
    fn from(distribution: &Distribution) -> Self {
        match &distribution.target {
            DistributionTarget::ExistingPallet { pallet_id } => Self {
                target_pallet_id: Some(*pallet_id),
                new_pallet_name: None,
                quantity: distribution.quantity,
            },
            DistributionTarget::NewPallet { name } => Self {
                target_pallet_id: None,
                new_pallet_name: Some(name.clone()),
                quantity: distribution.quantity,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedistributionPlan {
    pub source_pallet_id: PalletId,
    pub distributions: Vec<Distribution>,
    #[serde(default)]
    pub machine_id: Option<MachineId>,
}

impl RedistributionPlan {
    pub fn new(source_pallet_id: PalletId, distributions: Vec<Distribution>) -> Self {
        Self {
            source_pallet_id,
            distributions,
            machine_id: None,
        }
    }

    /// Sum of all shares, widened so oversized plans cannot overflow
    pub fn total_quantity(&self) -> u64 {
        self.distributions.iter().map(|d| u64::from(d.quantity)).sum()
    }

    pub fn existing_targets(&self) -> impl Iterator<Item = PalletId> + '_ {
        self.distributions.iter().filter_map(|d| match d.target {
            DistributionTarget::ExistingPallet { pallet_id } => Some(pallet_id),
            DistributionTarget::NewPallet { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_with_both_targets_is_rejected() {
        let request = DistributionRequest {
            target_pallet_id: Some(3),
            new_pallet_name: Some("П-2".to_string()),
            quantity: 4,
        };
        let err = Distribution::try_from(request).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_request_without_target_is_rejected() {
        let request = DistributionRequest {
            target_pallet_id: None,
            new_pallet_name: None,
            quantity: 4,
        };
        assert!(Distribution::try_from(request).is_err());
    }

    #[test]
    fn test_request_maps_to_single_target() {
        let request = DistributionRequest {
            target_pallet_id: None,
            new_pallet_name: Some("П-2".to_string()),
            quantity: 4,
        };
        let distribution = Distribution::try_from(request).unwrap();
        assert_eq!(distribution, Distribution::to_new("П-2", 4));

        let wire = DistributionRequest::from(&Distribution::to_existing(9, 6));
        assert_eq!(wire.target_pallet_id, Some(9));
        assert!(wire.new_pallet_name.is_none());
    }

    #[test]
    fn test_total_quantity_does_not_overflow() {
        let plan = RedistributionPlan::new(
            1,
            vec![Distribution::to_new("a", u32::MAX), Distribution::to_new("b", u32::MAX)],
        );
        assert_eq!(plan.total_quantity(), 2 * u64::from(u32::MAX));
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a pallet's progress record against one route stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Later stage whose predecessor has not completed yet
    #[default]
    NotProcessed,
    /// Eligible to start
    Pending,
    /// Currently being processed on a machine
    InProgress,
    Completed,
    /// Parked in a buffer cell mid-stage
    Buffered,
    Failed,
}

impl OperationStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if this is an active state (pallet is being processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Check if this record unlocks the next stage of the route
    pub fn satisfies_successor(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Statuses from which work may be (re)started
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            Self::NotProcessed | Self::Pending | Self::Buffered | Self::Failed
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotProcessed => write!(f, "NOT_PROCESSED"),
            Self::Pending => write!(f, "PENDING"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Buffered => write!(f, "BUFFERED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_PROCESSED" => Ok(Self::NotProcessed),
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            "BUFFERED" => Ok(Self::Buffered),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid operation status: {s}")),
        }
    }
}

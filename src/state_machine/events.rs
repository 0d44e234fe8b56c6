use serde::{Deserialize, Serialize};

/// Events that can trigger stage progression transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StageEvent {
    /// Predecessor completed, the stage becomes eligible
    Unlock,
    /// Operator starts processing
    Start,
    /// Operator completes processing
    Complete,
    /// Processing interrupted and the pallet parked in a buffer cell
    MoveToBuffer,
    /// Processing failed with a reason
    Fail(String),
    /// Return a failed record to the eligible state
    Reset,
}

impl StageEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Unlock => "unlock",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::MoveToBuffer => "move_to_buffer",
            Self::Fail(_) => "fail",
            Self::Reset => "reset",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a failure event with the given reason
    pub fn fail_with_reason(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }
}

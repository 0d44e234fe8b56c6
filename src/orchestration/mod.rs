//! # Command Orchestration
//!
//! Two-phase operator commands against the local pallet mirror.
//!
//! ## Core Components
//!
//! - **PalletCoordinator**: validates, applies optimistically, sends to the
//!   remote service and commits or rolls back on the answer
//! - **InFlightRegistry**: at most one outstanding command per pallet
//! - **CommandResolution**: confirmed, rejected or transport-failed outcome

pub mod commands;
pub mod coordinator;
pub mod in_flight;
pub mod resolution;

pub use commands::{AssignToMachine, CompleteWork, MoveToBuffer, StageCompletion, StartWork};
pub use coordinator::PalletCoordinator;
pub use in_flight::{InFlightCommand, InFlightGuard, InFlightRegistry};
pub use resolution::CommandResolution;

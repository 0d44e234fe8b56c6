//! # Pallet Domain Models
//!
//! Client-side mirror of the production entities owned by the remote service.
//! All quantities are whole part units held in `u32`, so a pallet quantity can
//! never be observed below zero.

pub mod buffer_cell;
pub mod defect;
pub mod machine;
pub mod operation;
pub mod pallet;
pub mod part;
pub mod redistribution;

pub type PalletId = i64;
pub type PartId = i64;
pub type StageId = i64;
pub type OperationId = i64;
pub type MachineId = i64;
pub type CellId = i64;
pub type OperatorId = i64;
pub type SegmentId = i64;

pub use buffer_cell::{BufferCell, CellStatus};
pub use defect::DefectRecord;
pub use machine::{Machine, MachineStatus};
pub use operation::Operation;
pub use pallet::{Pallet, PalletLocation};
pub use part::{Part, Route, RouteStage};
pub use redistribution::{Distribution, DistributionRequest, DistributionTarget, RedistributionPlan};

//! # Allocation
//!
//! Physical placement of pallets on machines and in buffer cells.

pub mod manager;
pub mod registry;

pub use manager::{AllocationChange, BufferAllocationManager};
pub use registry::{BufferCellRegistry, MachineRegistry};

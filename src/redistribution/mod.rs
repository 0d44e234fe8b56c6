//! Splitting and merging pallet quantities

pub mod planner;

pub use planner::{RedistributionOutcome, RedistributionPlanner};

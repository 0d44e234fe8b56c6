//! In-memory pallet mirror and its reconciliation primitives

pub mod pallet_store;

pub use pallet_store::{ApplyOutcome, PalletStore, SkipReason, StoreCheckpoint, StoreTransaction};

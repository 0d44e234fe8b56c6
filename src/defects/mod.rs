//! Part losses recorded against pallets

pub mod ledger;

pub use ledger::{DefectLedger, DefectOutcome, DefectReport};

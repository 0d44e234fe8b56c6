//! # Event Reconciliation
//!
//! Typed push events, the per-pallet re-fetch debouncer, and the reconciler
//! that applies both onto the local mirror.

pub mod debounce;
pub mod push_event;
pub mod reconciler;

pub use crate::store::{ApplyOutcome, SkipReason};
pub use debounce::RefetchDebouncer;
pub use push_event::{PushEvent, PushFrame};
pub use reconciler::{EventReconciler, ReconcileOutcome};

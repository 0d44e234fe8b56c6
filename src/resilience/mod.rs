//! # Resilience Module
//!
//! Retry timing for the push channel. Commands are never retried blindly:
//! only transport failures reach this policy, and only for reconnection.

pub mod backoff;

pub use backoff::ExponentialBackoff;

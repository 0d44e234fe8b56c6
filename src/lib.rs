#![allow(clippy::doc_markdown)] // Allow technical terms like WebSocket in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Pallet Core
//!
//! Client-side lifecycle and redistribution engine for production pallets.
//!
//! ## Overview
//!
//! A pallet is a batch of identical parts moving through a fixed route of
//! production stages. The remote production service owns the authoritative
//! state; this crate keeps a local mirror of the pallets of one part, applies
//! operator commands to it optimistically, and reconciles it with server
//! pushes.
//!
//! ## Architecture
//!
//! Commands are **two-phase**: validated and applied locally, sent to the
//! [`remote::ProductionService`], then confirmed or rolled back. At most one
//! command is in flight per pallet. Push events from the server travel over a
//! [`connection::PushConnection`] into the [`reconciliation::EventReconciler`],
//! which applies them under a version policy and collapses bursts of re-fetch
//! triggers with a per-pallet debounce.
//!
//! ## Module Organization
//!
//! - [`store`] - In-memory pallet mirror with atomic multi-pallet mutation
//! - [`state_machine`] - Per-stage operation status transitions and guards
//! - [`allocation`] - Buffer cell and machine placement
//! - [`defects`] - Defect ledger
//! - [`redistribution`] - Quantity-conserving pallet splits
//! - [`reconciliation`] - Push event application and re-fetch debounce
//! - [`connection`] - Push channel with backoff reconnect and room re-join
//! - [`orchestration`] - Two-phase command coordinator
//! - [`remote`] - Remote service seam and error classification
//! - [`config`] - Layered configuration
//! - [`error`] - Error taxonomy
//! - [`events`] - Lifecycle event bus
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pallet_core::allocation::{BufferCellRegistry, MachineRegistry};
//! use pallet_core::config::ConfigManager;
//! use pallet_core::events::EventPublisher;
//! use pallet_core::models::{Part, Route};
//! use pallet_core::orchestration::PalletCoordinator;
//! use pallet_core::remote::ProductionService;
//! use pallet_core::store::PalletStore;
//! use std::sync::Arc;
//!
//! # async fn example(part: Part, route: Route, service: Arc<dyn ProductionService>)
//! #     -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?.config().clone();
//! let coordinator = PalletCoordinator::new(
//!     Arc::new(PalletStore::new(part, route)),
//!     Arc::new(BufferCellRegistry::new(Vec::new())),
//!     Arc::new(MachineRegistry::new(Vec::new())),
//!     service,
//!     EventPublisher::default(),
//!     &config,
//! );
//! println!("{} pallets mirrored", coordinator.store().len());
//! # Ok(())
//! # }
//! ```

pub mod allocation;
pub mod config;
pub mod connection;
pub mod constants;
pub mod defects;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod reconciliation;
pub mod redistribution;
pub mod remote;
pub mod resilience;
pub mod state_machine;
pub mod store;
pub mod validation;

pub use allocation::{BufferAllocationManager, BufferCellRegistry, MachineRegistry};
pub use config::{ConfigManager, PalletConfig};
pub use connection::{ConnectionState, PushConnection, PushConnectionHandle, PushTransport, Room};
pub use defects::{DefectLedger, DefectReport};
pub use error::{ErrorKind, PalletError, PalletResult};
pub use events::{EventPublisher, PalletEvent};
pub use models::{Pallet, PalletLocation, RedistributionPlan};
pub use orchestration::{CommandResolution, PalletCoordinator};
pub use reconciliation::{EventReconciler, PushEvent};
pub use redistribution::RedistributionPlanner;
pub use remote::ProductionService;
pub use state_machine::{OperationStatus, StageStateMachine};
pub use store::PalletStore;

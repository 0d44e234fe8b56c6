pub mod listener;
pub mod publisher;
pub mod types;

// Re-export key types for convenience
pub use listener::{ListenerRegistry, PalletEventListener};
pub use publisher::{EventPublisher, PublishedEvent};
pub use types::{names, CatalogChange, ChangeOrigin, PalletEvent};

//! # Event Publisher
//!
//! Broadcast bus the coordinator and reconciler publish lifecycle events on.
//! Publishing never fails: with no subscribers the event is simply dropped,
//! and a lagging subscriber loses the oldest events rather than blocking
//! commands.
//!
//! ```rust
//! use pallet_core::events::{ChangeOrigin, EventPublisher, PalletEvent};
//!
//! # tokio_test::block_on(async {
//! let publisher = EventPublisher::new(16);
//! let mut events = publisher.subscribe();
//!
//! let delivered =
//!     publisher.publish(PalletEvent::PalletRemoved { pallet_id: 7, origin: ChangeOrigin::Local });
//! assert_eq!(delivered, 1);
//!
//! assert_eq!(events.recv().await.unwrap().event.pallet_id(), Some(7));
//! # });
//! ```

use super::types::PalletEvent;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Broadcast bus for pallet lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event: PalletEvent,
    pub published_at: DateTime<Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current subscriber, returning how many
    /// subscribers it reached
    pub fn publish(&self, event: PalletEvent) -> usize {
        let event = PublishedEvent {
            event,
            published_at: Utc::now(),
        };

        // No subscribers is acceptable; events are published even if no one is listening
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(_)) => 0,
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

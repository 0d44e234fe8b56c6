//! # Typed Event Listeners
//!
//! Consumers implement [`PalletEventListener`] and register it with a
//! [`ListenerRegistry`]; a single dispatch task forwards every published event
//! to all registered listeners. Listener failures never reach the publisher.

use super::publisher::{EventPublisher, PublishedEvent};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[async_trait]
pub trait PalletEventListener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn on_event(&self, event: &PublishedEvent);
}

#[derive(Clone)]
pub struct ListenerRegistry {
    publisher: EventPublisher,
    listeners: Arc<RwLock<Vec<Arc<dyn PalletEventListener>>>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ListenerRegistry {
    pub fn new(publisher: EventPublisher) -> Self {
        Self {
            publisher,
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn register(&self, listener: Arc<dyn PalletEventListener>) {
        debug!(listener = listener.name(), "Registering pallet event listener");
        self.listeners.write().push(listener);
    }

    /// Remove every listener with the given name, returning how many were removed
    pub fn unregister(&self, name: &str) -> usize {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|listener| listener.name() != name);
        before - listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Spawn the dispatch loop. It ends when the publisher side is dropped.
    pub fn spawn_dispatch(&self) -> JoinHandle<()> {
        let mut receiver = self.publisher.subscribe();
        let listeners = Arc::clone(&self.listeners);

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let snapshot: Vec<_> = listeners.read().iter().cloned().collect();
                        join_all(snapshot.iter().map(|listener| listener.on_event(&event))).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Listener dispatch lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

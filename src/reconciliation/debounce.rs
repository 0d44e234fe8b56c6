//! Trailing-edge debounce of per-pallet re-fetch triggers.
//!
//! Every trigger bumps the pallet's generation and arms a timer; when a timer
//! expires it fires only if no newer trigger arrived in the meantime, so a
//! burst of triggers inside one window yields exactly one re-fetch.

use crate::models::PalletId;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct RefetchDebouncer {
    window: Duration,
    generations: Arc<DashMap<PalletId, u64>>,
    fire: mpsc::UnboundedSender<PalletId>,
}

impl RefetchDebouncer {
    /// Returns the debouncer and the receiver of fired pallet ids
    pub fn new(window: Duration) -> (Self, mpsc::UnboundedReceiver<PalletId>) {
        let (fire, fired) = mpsc::unbounded_channel();
        (
            Self {
                window,
                generations: Arc::new(DashMap::new()),
                fire,
            },
            fired,
        )
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule a re-fetch of `pallet_id`, superseding any pending one.
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self, pallet_id: PalletId) {
        let generation = {
            let mut entry = self.generations.entry(pallet_id).or_insert(0);
            *entry += 1;
            *entry
        };
        trace!(pallet_id, generation, "Re-fetch trigger");

        let generations = Arc::clone(&self.generations);
        let fire = self.fire.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let latest = generations
                .remove_if(&pallet_id, |_, current| *current == generation)
                .is_some();
            if latest {
                let _ = fire.send(pallet_id);
            }
        });
    }

    /// Pallets with a timer still armed
    pub fn pending(&self) -> usize {
        self.generations.len()
    }

    pub fn is_pending(&self, pallet_id: PalletId) -> bool {
        self.generations.contains_key(&pallet_id)
    }
}

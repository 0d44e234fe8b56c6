//! # In-Flight Command Registry
//!
//! At most one mutation may be outstanding per pallet. Acquiring a pallet
//! returns an [`InFlightGuard`]; the pallet is released when the guard drops,
//! whether the command was confirmed, rejected, failed in transport, or its
//! task was cancelled.

use crate::error::{PalletError, PalletResult};
use crate::models::PalletId;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightCommand {
    pub command_id: Uuid,
    pub operation: &'static str,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    commands: Arc<DashMap<PalletId, InFlightCommand>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a single pallet for `operation`
    pub fn acquire(&self, pallet_id: PalletId, operation: &'static str) -> PalletResult<InFlightGuard> {
        self.acquire_many(&[pallet_id], operation)
    }

    /// Claim every pallet in `pallet_ids` or none of them
    pub fn acquire_many(&self, pallet_ids: &[PalletId], operation: &'static str) -> PalletResult<InFlightGuard> {
        let command = InFlightCommand {
            command_id: Uuid::new_v4(),
            operation,
            started_at: Utc::now(),
        };

        let mut claimed = Vec::with_capacity(pallet_ids.len());
        for &pallet_id in pallet_ids {
            if claimed.contains(&pallet_id) {
                continue;
            }
            // The shard lock held by the entry is released at the end of this statement
            let busy = match self.commands.entry(pallet_id) {
                Entry::Occupied(_) => true,
                Entry::Vacant(slot) => {
                    slot.insert(command.clone());
                    false
                }
            };
            if busy {
                for id in &claimed {
                    self.commands
                        .remove_if(id, |_, held| held.command_id == command.command_id);
                }
                return Err(PalletError::OperationInProgress { pallet_id });
            }
            claimed.push(pallet_id);
        }

        trace!(command_id = %command.command_id, operation, pallets = ?claimed, "Pallets claimed");
        Ok(InFlightGuard {
            commands: Arc::clone(&self.commands),
            pallet_ids: claimed,
            command_id: command.command_id,
        })
    }

    pub fn contains(&self, pallet_id: PalletId) -> bool {
        self.commands.contains_key(&pallet_id)
    }

    pub fn get(&self, pallet_id: PalletId) -> Option<InFlightCommand> {
        self.commands.get(&pallet_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// RAII claim on one or more pallets
#[derive(Debug)]
pub struct InFlightGuard {
    commands: Arc<DashMap<PalletId, InFlightCommand>>,
    pallet_ids: Vec<PalletId>,
    command_id: Uuid,
}

impl InFlightGuard {
    pub fn command_id(&self) -> Uuid {
        self.command_id
    }

    pub fn pallet_ids(&self) -> &[PalletId] {
        &self.pallet_ids
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        for pallet_id in &self.pallet_ids {
            self.commands
                .remove_if(pallet_id, |_, held| held.command_id == self.command_id);
        }
    }
}

//! # Pallet Store
//!
//! In-memory mirror of the pallets belonging to one part. The remote service is
//! the system of record; this store holds optimistic local state between a
//! command being issued and its confirmation.
//!
//! All reads hand out clones. Multi-pallet mutations go through
//! [`PalletStore::mutate`], which runs a closure against a working copy and
//! commits it only if the closure succeeds.

use crate::error::{PalletError, PalletResult};
use crate::models::{Pallet, PalletId, Part, Route, RouteStage, StageId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::debug;

/// Why an incoming snapshot was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Incoming version is older than the local one
    Stale,
    /// Incoming snapshot is identical to local state
    Duplicate,
    /// A local command is in flight for the pallet
    PendingLocalMutation,
    /// Snapshot belongs to another part
    ForeignPart,
}

/// Result of applying an externally delivered change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum ApplyOutcome {
    Applied,
    Skipped(SkipReason),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Per-pallet ordering metadata used by reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct VersionRecord {
    server_version: Option<u64>,
    arrival_seq: u64,
}

/// Saved pre-mutation state of a set of pallets. `None` means the pallet did
/// not exist when the checkpoint was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreCheckpoint {
    entries: Vec<(PalletId, Option<Pallet>)>,
}

impl StoreCheckpoint {
    pub fn pallet_ids(&self) -> impl Iterator<Item = PalletId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Server version `pallet_id` carried when the checkpoint was taken
    pub fn version_of(&self, pallet_id: PalletId) -> Option<u64> {
        self.entries
            .iter()
            .find(|(id, _)| *id == pallet_id)
            .and_then(|(_, saved)| saved.as_ref())
            .and_then(|pallet| pallet.version)
    }

    /// Add a pallet id that did not exist at checkpoint time, so rollback removes it
    pub fn track_created(&mut self, pallet_id: PalletId) {
        if !self.entries.iter().any(|(id, _)| *id == pallet_id) {
            self.entries.push((pallet_id, None));
        }
    }
}

#[derive(Debug, Default, Clone)]
struct StoreInner {
    pallets: BTreeMap<PalletId, Pallet>,
    versions: HashMap<PalletId, VersionRecord>,
    /// Server versions of deletions, so a late snapshot cannot resurrect a pallet
    tombstones: HashMap<PalletId, Option<u64>>,
}

impl StoreInner {
    /// Server version from the version record, the stored pallet or a tombstone
    fn last_known_version(&self, pallet_id: PalletId) -> Option<u64> {
        self.versions
            .get(&pallet_id)
            .and_then(|record| record.server_version)
            .or_else(|| self.pallets.get(&pallet_id).and_then(|p| p.version))
            .or_else(|| self.tombstones.get(&pallet_id).copied().flatten())
    }
}

/// Working copy handed to [`PalletStore::mutate`] closures
#[derive(Debug)]
pub struct StoreTransaction<'a> {
    pallets: BTreeMap<PalletId, Pallet>,
    removed: Vec<PalletId>,
    route: &'a Route,
    tentative_ids: &'a AtomicI64,
}

impl StoreTransaction<'_> {
    pub fn get(&self, pallet_id: PalletId) -> PalletResult<&Pallet> {
        self.pallets
            .get(&pallet_id)
            .ok_or(PalletError::PalletNotFound { pallet_id })
    }

    pub fn get_mut(&mut self, pallet_id: PalletId) -> PalletResult<&mut Pallet> {
        self.pallets
            .get_mut(&pallet_id)
            .ok_or(PalletError::PalletNotFound { pallet_id })
    }

    pub fn pallets(&self) -> impl Iterator<Item = &Pallet> {
        self.pallets.values()
    }

    pub fn insert(&mut self, pallet: Pallet) {
        self.removed.retain(|id| *id != pallet.pallet_id);
        self.pallets.insert(pallet.pallet_id, pallet);
    }

    pub fn remove(&mut self, pallet_id: PalletId) -> Option<Pallet> {
        let removed = self.pallets.remove(&pallet_id);
        if removed.is_some() {
            self.removed.push(pallet_id);
        }
        removed
    }

    pub fn route(&self) -> &Route {
        self.route
    }

    pub fn next_tentative_id(&self) -> PalletId {
        self.tentative_ids.fetch_sub(1, Ordering::Relaxed)
    }
}

/// Client-side mirror of the pallets of one part
#[derive(Debug)]
pub struct PalletStore {
    part: Part,
    route: Route,
    inner: RwLock<StoreInner>,
    tentative_ids: AtomicI64,
    arrivals: AtomicU64,
}

impl PalletStore {
    pub fn new(part: Part, route: Route) -> Self {
        Self {
            part,
            route,
            inner: RwLock::new(StoreInner::default()),
            tentative_ids: AtomicI64::new(-1),
            arrivals: AtomicU64::new(0),
        }
    }

    /// Build a store pre-populated with server-confirmed pallets
    pub fn with_pallets(part: Part, route: Route, pallets: impl IntoIterator<Item = Pallet>) -> Self {
        let store = Self::new(part, route);
        for pallet in pallets {
            store.insert(pallet);
        }
        store
    }

    pub fn part(&self) -> &Part {
        &self.part
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn stage(&self, stage_id: StageId) -> Option<&RouteStage> {
        self.route.stage(stage_id)
    }

    pub fn predecessor_of(&self, stage_id: StageId) -> Option<&RouteStage> {
        self.route.predecessor_of(stage_id)
    }

    pub fn successor_of(&self, stage_id: StageId) -> Option<&RouteStage> {
        self.route.successor_of(stage_id)
    }

    pub fn is_first_stage(&self, stage_id: StageId) -> bool {
        self.route.is_first_stage(stage_id)
    }

    pub fn get(&self, pallet_id: PalletId) -> PalletResult<Pallet> {
        self.inner
            .read()
            .pallets
            .get(&pallet_id)
            .cloned()
            .ok_or(PalletError::PalletNotFound { pallet_id })
    }

    pub fn contains(&self, pallet_id: PalletId) -> bool {
        self.inner.read().pallets.contains_key(&pallet_id)
    }

    /// Snapshot of every pallet, ordered by id
    pub fn pallets(&self) -> Vec<Pallet> {
        self.inner.read().pallets.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().pallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().pallets.is_empty()
    }

    pub fn total_quantity(&self) -> u64 {
        self.inner
            .read()
            .pallets
            .values()
            .map(|p| u64::from(p.quantity))
            .sum()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Pallet> {
        self.inner
            .read()
            .pallets
            .values()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Insert or overwrite a pallet, returning the previous value
    pub fn insert(&self, pallet: Pallet) -> Option<Pallet> {
        let seq = self.next_arrival();
        let mut inner = self.inner.write();
        inner.tombstones.remove(&pallet.pallet_id);
        inner.versions.insert(
            pallet.pallet_id,
            VersionRecord {
                server_version: pallet.version,
                arrival_seq: seq,
            },
        );
        inner.pallets.insert(pallet.pallet_id, pallet)
    }

    pub fn remove(&self, pallet_id: PalletId) -> PalletResult<Pallet> {
        let mut inner = self.inner.write();
        inner.versions.remove(&pallet_id);
        inner
            .pallets
            .remove(&pallet_id)
            .ok_or(PalletError::PalletNotFound { pallet_id })
    }

    /// Mutate a single pallet in place, returning the updated copy
    pub fn update<F>(&self, pallet_id: PalletId, f: F) -> PalletResult<Pallet>
    where
        F: FnOnce(&mut Pallet) -> PalletResult<()>,
    {
        let mut inner = self.inner.write();
        let current = inner
            .pallets
            .get(&pallet_id)
            .ok_or(PalletError::PalletNotFound { pallet_id })?;

        let mut working = current.clone();
        f(&mut working)?;
        if working.pallet_id != pallet_id {
            return Err(PalletError::Internal(format!(
                "update of pallet {pallet_id} changed its id to {}",
                working.pallet_id
            )));
        }
        inner.pallets.insert(pallet_id, working.clone());
        Ok(working)
    }

    /// Run `f` against a working copy of the whole store and commit the result
    /// atomically. Nothing is written if `f` fails.
    pub fn mutate<T, F>(&self, f: F) -> PalletResult<T>
    where
        F: FnOnce(&mut StoreTransaction<'_>) -> PalletResult<T>,
    {
        let mut inner = self.inner.write();
        let mut tx = StoreTransaction {
            pallets: inner.pallets.clone(),
            removed: Vec::new(),
            route: &self.route,
            tentative_ids: &self.tentative_ids,
        };

        let result = f(&mut tx)?;

        let StoreTransaction {
            pallets, removed, ..
        } = tx;
        for pallet_id in &removed {
            inner.versions.remove(pallet_id);
        }
        let new_ids: Vec<PalletId> = pallets
            .keys()
            .filter(|id| !inner.pallets.contains_key(id))
            .copied()
            .collect();
        inner.pallets = pallets;
        for pallet_id in new_ids {
            let seq = self.next_arrival();
            inner.versions.insert(
                pallet_id,
                VersionRecord {
                    server_version: None,
                    arrival_seq: seq,
                },
            );
        }

        Ok(result)
    }

    /// Negative id for an optimistically created pallet
    pub fn next_tentative_id(&self) -> PalletId {
        self.tentative_ids.fetch_sub(1, Ordering::Relaxed)
    }

    /// Record the current state of `ids` so a failed command can be undone
    pub fn checkpoint(&self, ids: &[PalletId]) -> StoreCheckpoint {
        let inner = self.inner.read();
        StoreCheckpoint {
            entries: ids
                .iter()
                .map(|id| (*id, inner.pallets.get(id).cloned()))
                .collect(),
        }
    }

    /// Restore every pallet recorded in `checkpoint`
    pub fn rollback(&self, checkpoint: StoreCheckpoint) {
        let mut inner = self.inner.write();
        for (pallet_id, saved) in checkpoint.entries {
            match saved {
                Some(pallet) => {
                    inner.pallets.insert(pallet_id, pallet);
                }
                None => {
                    inner.pallets.remove(&pallet_id);
                    inner.versions.remove(&pallet_id);
                }
            }
        }
        debug!("Pallet store rolled back to checkpoint");
    }

    /// Swap a locally created pallet for its server-confirmed counterpart
    pub fn replace_tentative(&self, tentative_id: PalletId, confirmed: Pallet) -> PalletResult<()> {
        let seq = self.next_arrival();
        let mut inner = self.inner.write();
        inner
            .pallets
            .remove(&tentative_id)
            .ok_or(PalletError::PalletNotFound {
                pallet_id: tentative_id,
            })?;
        inner.versions.remove(&tentative_id);
        inner.versions.insert(
            confirmed.pallet_id,
            VersionRecord {
                server_version: confirmed.version,
                arrival_seq: seq,
            },
        );
        inner.pallets.insert(confirmed.pallet_id, confirmed);
        Ok(())
    }

    /// Apply an externally delivered pallet snapshot under the version policy:
    /// with versions on both sides the incoming one must not be older, otherwise
    /// arrival order wins. Identical snapshots are reported as duplicates.
    pub fn apply_snapshot(&self, mut incoming: Pallet) -> ApplyOutcome {
        if incoming.part_id != self.part.part_id {
            return ApplyOutcome::Skipped(SkipReason::ForeignPart);
        }

        let seq = self.next_arrival();
        let mut inner = self.inner.write();
        let pallet_id = incoming.pallet_id;

        if let Some(tombstone) = inner.tombstones.get(&pallet_id) {
            match (tombstone, incoming.version) {
                (Some(deleted_at), Some(version)) if version <= *deleted_at => {
                    return ApplyOutcome::Skipped(SkipReason::Stale);
                }
                (Some(_), None) => return ApplyOutcome::Skipped(SkipReason::Stale),
                _ => {}
            }
        }

        if let Some(local) = inner.pallets.get(&pallet_id) {
            incoming.inherit_history(local);
            if *local == incoming {
                return ApplyOutcome::Skipped(SkipReason::Duplicate);
            }
            let local_version = inner
                .versions
                .get(&pallet_id)
                .and_then(|record| record.server_version)
                .or(local.version);
            if let (Some(local_version), Some(incoming_version)) = (local_version, incoming.version) {
                if incoming_version < local_version {
                    return ApplyOutcome::Skipped(SkipReason::Stale);
                }
            }
        }

        inner.tombstones.remove(&pallet_id);
        inner.versions.insert(
            pallet_id,
            VersionRecord {
                server_version: incoming.version,
                arrival_seq: seq,
            },
        );
        inner.pallets.insert(pallet_id, incoming);
        ApplyOutcome::Applied
    }

    /// Apply an externally delivered or confirmed deletion. A deletion without
    /// a version keeps the last known server version as its tombstone.
    pub fn apply_deletion(&self, pallet_id: PalletId, version: Option<u64>) -> ApplyOutcome {
        let mut inner = self.inner.write();
        let local_version = inner.last_known_version(pallet_id);

        if let (Some(local_version), Some(version)) = (local_version, version) {
            if version < local_version {
                return ApplyOutcome::Skipped(SkipReason::Stale);
            }
        }

        inner.tombstones.insert(pallet_id, version.or(local_version));
        inner.versions.remove(&pallet_id);
        match inner.pallets.remove(&pallet_id) {
            Some(_) => ApplyOutcome::Applied,
            None => ApplyOutcome::Skipped(SkipReason::Duplicate),
        }
    }

    /// Arrival sequence of the last write to `pallet_id`
    pub fn arrival_seq(&self, pallet_id: PalletId) -> Option<u64> {
        self.inner
            .read()
            .versions
            .get(&pallet_id)
            .map(|record| record.arrival_seq)
    }

    fn next_arrival(&self) -> u64 {
        self.arrivals.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteStage;

    fn store() -> PalletStore {
        let part = Part {
            part_id: 1,
            article: "ДСП-001".into(),
            name: "Боковина".into(),
            material: "ЛДСП".into(),
            size: "720x560".into(),
            total_quantity: 30,
            completed: 0,
            ready_for_processing: 30,
        };
        let route = Route::new(
            1,
            vec![RouteStage { stage_id: 10, name: "Раскрой".into(), sequence: 1 }],
        );
        PalletStore::with_pallets(
            part,
            route,
            [Pallet::new(1, "П-1", 10, 1), Pallet::new(2, "П-2", 20, 1)],
        )
    }

    #[test]
    fn test_basic_queries() {
        let store = store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_quantity(), 30);
        assert!(store.contains(1));
        assert_eq!(store.find_by_name("П-2").unwrap().pallet_id, 2);
        assert!(matches!(
            store.get(9),
            Err(PalletError::PalletNotFound { pallet_id: 9 })
        ));
    }

    #[test]
    fn test_tentative_ids_are_negative_and_unique() {
        let store = store();
        let a = store.next_tentative_id();
        let b = store.next_tentative_id();
        assert!(a < 0 && b < 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_mutate_is_all_or_nothing() {
        let store = store();
        let result: PalletResult<()> = store.mutate(|tx| {
            tx.get_mut(1)?.quantity = 0;
            tx.remove(2);
            Err(PalletError::validation("abort"))
        });
        assert!(result.is_err());
        assert_eq!(store.get(1).unwrap().quantity, 10);
        assert!(store.contains(2));

        store
            .mutate(|tx| {
                tx.get_mut(1)?.quantity = 4;
                let id = tx.next_tentative_id();
                tx.insert(Pallet::new(id, "П-3", 6, 1));
                Ok(())
            })
            .unwrap();
        assert_eq!(store.total_quantity(), 30);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_checkpoint_rollback_restores_and_removes() {
        let store = store();
        let mut checkpoint = store.checkpoint(&[1, 2]);
        store.update(1, |p| {
            p.quantity = 3;
            Ok(())
        })
        .unwrap();
        store.remove(2).unwrap();
        store.insert(Pallet::new(-1, "П-new", 7, 1));
        checkpoint.track_created(-1);

        store.rollback(checkpoint);
        assert_eq!(store.get(1).unwrap().quantity, 10);
        assert_eq!(store.get(2).unwrap().quantity, 20);
        assert!(!store.contains(-1));
    }

    #[test]
    fn test_replace_tentative() {
        let store = store();
        store.insert(Pallet::new(-1, "П-new", 7, 1));
        let mut confirmed = Pallet::new(77, "П-new", 7, 1);
        confirmed.version = Some(1);
        store.replace_tentative(-1, confirmed).unwrap();
        assert!(!store.contains(-1));
        assert_eq!(store.get(77).unwrap().version, Some(1));
    }

    #[test]
    fn test_apply_snapshot_version_policy() {
        let store = store();
        let mut newer = store.get(1).unwrap();
        newer.quantity = 8;
        newer.version = Some(5);
        assert_eq!(store.apply_snapshot(newer.clone()), ApplyOutcome::Applied);
        assert_eq!(
            store.apply_snapshot(newer.clone()),
            ApplyOutcome::Skipped(SkipReason::Duplicate)
        );

        let mut older = newer.clone();
        older.quantity = 9;
        older.version = Some(4);
        assert_eq!(
            store.apply_snapshot(older),
            ApplyOutcome::Skipped(SkipReason::Stale)
        );
        assert_eq!(store.get(1).unwrap().quantity, 8);

        let mut unversioned = newer;
        unversioned.quantity = 2;
        unversioned.version = None;
        assert_eq!(store.apply_snapshot(unversioned), ApplyOutcome::Applied);
    }

    #[test]
    fn test_deletion_blocks_stale_resurrection() {
        let store = store();
        assert_eq!(store.apply_deletion(1, Some(3)), ApplyOutcome::Applied);
        let mut late = Pallet::new(1, "П-1", 10, 1);
        late.version = Some(2);
        assert_eq!(
            store.apply_snapshot(late),
            ApplyOutcome::Skipped(SkipReason::Stale)
        );
        assert!(!store.contains(1));
    }

    #[test]
    fn test_unversioned_deletion_keeps_last_known_version() {
        let store = store();
        let mut current = store.get(2).unwrap();
        current.version = Some(4);
        assert_eq!(store.apply_snapshot(current.clone()), ApplyOutcome::Applied);

        assert_eq!(store.apply_deletion(2, None), ApplyOutcome::Applied);
        assert_eq!(
            store.apply_snapshot(current.clone()),
            ApplyOutcome::Skipped(SkipReason::Stale)
        );

        current.version = Some(5);
        assert_eq!(store.apply_snapshot(current), ApplyOutcome::Applied);
    }

    #[test]
    fn test_snapshot_without_history_keeps_local_history() {
        use crate::models::Operation;
        use crate::state_machine::OperationStatus;

        let store = store();
        let mut local = store.get(1).unwrap();
        local.stage_history.push(Operation::new(110, 1, 10, OperationStatus::Completed));
        local.current_stage_progress = Some(Operation::new(120, 1, 20, OperationStatus::Pending));
        store.insert(local.clone());

        let mut snapshot = local.clone();
        snapshot.stage_history.clear();
        snapshot.quantity = 9;
        snapshot.version = Some(1);
        assert_eq!(store.apply_snapshot(snapshot), ApplyOutcome::Applied);

        let stored = store.get(1).unwrap();
        assert_eq!(stored.quantity, 9);
        assert_eq!(stored.stage_history, local.stage_history);
    }

    #[test]
    fn test_foreign_part_is_skipped() {
        let store = store();
        assert_eq!(
            store.apply_snapshot(Pallet::new(5, "П-5", 1, 99)),
            ApplyOutcome::Skipped(SkipReason::ForeignPart)
        );
    }
}

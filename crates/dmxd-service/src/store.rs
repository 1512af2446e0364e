//! `UniverseStore` (§4.2): owns every `Universe`, keyed by `UniverseId`,
//! and implements the decoupled mark/sweep GC the spec calls for — a
//! universe that drops to zero members stays retrievable until an
//! explicit `garbage_collect()` sweep, so a caller that removes the last
//! member and immediately re-adds one never loses the universe.

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use tracing::debug;

use dmxd_core::{Timestamp, Universe, UniverseId};

/// Owns every live universe. Each universe is behind its own
/// `parking_lot::Mutex` rather than one store-wide lock, so merges on
/// different universes never contend with each other.
pub struct UniverseStore {
    universes: DashMap<UniverseId, Mutex<Universe>>,
    marked: DashSet<UniverseId>,
}

impl UniverseStore {
    pub fn new() -> Self {
        Self {
            universes: DashMap::new(),
            marked: DashSet::new(),
        }
    }

    pub fn exists(&self, id: UniverseId) -> bool {
        self.universes.contains_key(&id)
    }

    /// `get_or_create` (§4.2): idempotent, never fails.
    pub fn get_or_create(&self, id: UniverseId) {
        self.universes.entry(id).or_insert_with(|| Mutex::new(Universe::new(id)));
    }

    /// Queues `id` for the next `garbage_collect()` sweep. A no-op if the
    /// universe doesn't exist; harmless if called more than once.
    pub fn mark_for_gc(&self, id: UniverseId) {
        self.marked.insert(id);
    }

    /// Sweeps every marked universe that is still GC-eligible at the
    /// moment of the sweep (membership may have grown again since it was
    /// marked, in which case it survives). Returns the number destroyed.
    pub fn garbage_collect(&self) -> usize {
        let candidates: Vec<UniverseId> = self.marked.iter().map(|e| *e).collect();
        let mut swept = 0;
        for id in candidates {
            self.marked.remove(&id);
            let eligible = self
                .universes
                .get(&id)
                .map(|u| u.lock().is_gc_eligible())
                .unwrap_or(false);
            if eligible {
                self.universes.remove(&id);
                swept += 1;
                debug!(?id, "universe garbage collected");
            }
        }
        swept
    }

    /// Runs `f` against the universe's locked state, if it exists.
    pub fn with_universe<R>(&self, id: UniverseId, f: impl FnOnce(&mut Universe) -> R) -> Option<R> {
        self.universes.get(&id).map(|entry| f(&mut entry.lock()))
    }

    /// `get_or_create` followed immediately by `with_universe`, for
    /// operations that auto-create (`RegisterForDmx`, port patching).
    pub fn with_universe_or_create<R>(&self, id: UniverseId, f: impl FnOnce(&mut Universe) -> R) -> R {
        self.get_or_create(id);
        self.with_universe(id, f)
            .expect("just inserted by get_or_create")
    }

    /// `SourceExpiryTick` (§4.2) run across every universe. Returns the
    /// ids whose merged output changed as a result, for the caller to
    /// dispatch.
    pub fn expire_all(&self, now: Timestamp) -> Vec<UniverseId> {
        let mut changed = Vec::new();
        for entry in self.universes.iter() {
            if entry.value().lock().expire_sources_default(now) {
                changed.push(*entry.key());
            }
        }
        changed
    }

    pub fn ids(&self) -> Vec<UniverseId> {
        self.universes.iter().map(|e| *e.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.universes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }
}

impl Default for UniverseStore {
    fn default() -> Self {
        Self::new()
    }
}

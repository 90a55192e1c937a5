//! Population registry: tournament membership, per-sweep combat status and eliminations.

use crate::models::contestant::ContestantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Snapshot of the three registry flags for one id, used by [`PopulationRegistry::count`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Membership {
    pub queued: bool,
    pub alive: bool,
    pub dead: bool,
}

/// Who is in the tournament, who has already fought this sweep, and who is out.
///
/// `queued` holds members still in the running. Eliminating a contestant moves it from
/// `queued` to `dead`, so an id is never queued and dead at once. `alive` marks ids that fought
/// and survived the current sweep and is cleared between sweeps; `dead` only grows until
/// [`reset`](Self::reset).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PopulationRegistry {
    /// Population in pairing order (ascending id).
    ids: Vec<ContestantId>,
    queued: BTreeSet<ContestantId>,
    alive: BTreeSet<ContestantId>,
    dead: BTreeSet<ContestantId>,
}

impl PopulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh registry with every given id queued.
    pub fn with_population(ids: impl IntoIterator<Item = ContestantId>) -> Self {
        let mut registry = Self::new();
        for id in ids {
            registry.enqueue(id);
        }
        registry
    }

    /// Add an id to the population. Ignored for ids already registered.
    pub fn enqueue(&mut self, id: ContestantId) {
        if self.contains(id) {
            return;
        }
        let pos = self.ids.partition_point(|&x| x < id);
        self.ids.insert(pos, id);
        self.queued.insert(id);
    }

    pub fn contains(&self, id: ContestantId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn ids(&self) -> &[ContestantId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn membership(&self, id: ContestantId) -> Membership {
        Membership {
            queued: self.queued.contains(&id),
            alive: self.alive.contains(&id),
            dead: self.dead.contains(&id),
        }
    }

    /// Queued, not eliminated, and not yet fought this sweep.
    pub fn is_eligible(&self, id: ContestantId) -> bool {
        let m = self.membership(id);
        m.queued && !m.alive && !m.dead
    }

    pub fn is_alive(&self, id: ContestantId) -> bool {
        self.alive.contains(&id)
    }

    pub fn is_dead(&self, id: ContestantId) -> bool {
        self.dead.contains(&id)
    }

    /// Mark an id as having fought and survived this sweep. No-op for dead ids.
    pub fn mark_alive(&mut self, id: ContestantId) {
        if self.dead.contains(&id) {
            return;
        }
        self.alive.insert(id);
    }

    /// Eliminate an id for the rest of the tournament.
    pub fn mark_dead(&mut self, id: ContestantId) {
        self.queued.remove(&id);
        self.alive.remove(&id);
        self.dead.insert(id);
    }

    /// Number of registered ids whose membership satisfies `predicate`.
    pub fn count(&self, predicate: impl Fn(Membership) -> bool) -> usize {
        self.ids
            .iter()
            .filter(|&&id| predicate(self.membership(id)))
            .count()
    }

    /// Ids still eligible for pairing, in pairing order.
    pub fn eligible_ids(&self) -> Vec<ContestantId> {
        self.ids
            .iter()
            .copied()
            .filter(|&id| self.is_eligible(id))
            .collect()
    }

    /// Registered ids that are not dead, in pairing order.
    pub fn survivors(&self) -> Vec<ContestantId> {
        self.ids
            .iter()
            .copied()
            .filter(|id| !self.dead.contains(id))
            .collect()
    }

    pub fn dead_ids(&self) -> impl Iterator<Item = ContestantId> + '_ {
        self.dead.iter().copied()
    }

    /// Clear per-sweep combat status; eliminations stay.
    pub fn start_round(&mut self) {
        self.alive.clear();
    }

    /// Forget the whole population (end of tournament).
    pub fn reset(&mut self) {
        self.ids.clear();
        self.queued.clear();
        self.alive.clear();
        self.dead.clear();
    }
}

//! Opponent selection: bounded random draws, then a deterministic scan upward from the first id.

use crate::logic::random::RandomSource;
use crate::models::{ContestantId, OwnerId, PopulationRegistry};
use std::collections::{BTreeMap, BTreeSet};

/// Picks second contestants for one sweep.
///
/// The draw pool is fixed when the sweep starts (every queued id); eligibility is re-checked
/// against the registry on each draw, so ids that fought earlier in the sweep are skipped.
#[derive(Clone, Debug)]
pub struct Matchmaker {
    pool: Vec<ContestantId>,
    attempts: u32,
    /// Ids pulled out of the rest of this sweep (a gateway call failed for them).
    benched: BTreeSet<ContestantId>,
}

impl Matchmaker {
    pub fn new(registry: &PopulationRegistry, attempts: u32) -> Self {
        Self {
            pool: registry.eligible_ids(),
            attempts,
            benched: BTreeSet::new(),
        }
    }

    pub fn bench(&mut self, id: ContestantId) {
        self.benched.insert(id);
    }

    pub fn is_benched(&self, id: ContestantId) -> bool {
        self.benched.contains(&id)
    }

    pub fn benched(&self) -> impl Iterator<Item = ContestantId> + '_ {
        self.benched.iter().copied()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Whether `candidate` can be paired with `first_id` right now.
    fn accepts(
        &self,
        registry: &PopulationRegistry,
        owners: &BTreeMap<ContestantId, OwnerId>,
        first_id: ContestantId,
        exclude_owner: &str,
        candidate: ContestantId,
    ) -> bool {
        candidate != first_id
            && !self.benched.contains(&candidate)
            && registry.is_eligible(candidate)
            && owners
                .get(&candidate)
                .map_or(false, |owner| owner != exclude_owner)
    }

    /// Pick an opponent for `first_id` whose owner is not `exclude_owner`.
    ///
    /// Returns `None` when nobody qualifies; the first contestant then sits out this sweep.
    pub fn select_opponent<R: RandomSource + ?Sized>(
        &self,
        registry: &PopulationRegistry,
        owners: &BTreeMap<ContestantId, OwnerId>,
        first_id: ContestantId,
        exclude_owner: &str,
        rng: &mut R,
    ) -> Option<ContestantId> {
        if !self.pool.is_empty() {
            let len = self.pool.len() as u32;
            for _ in 0..self.attempts {
                let candidate = self.pool[rng.below(len) as usize];
                if self.accepts(registry, owners, first_id, exclude_owner, candidate) {
                    return Some(candidate);
                }
            }
        }

        let ids = registry.ids();
        let start = ids.partition_point(|&id| id <= first_id);
        ids[start..]
            .iter()
            .copied()
            .find(|&id| self.accepts(registry, owners, first_id, exclude_owner, id))
    }
}

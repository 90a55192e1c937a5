//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use battle_arena::{
    Arena, CollectingSink, ContestantId, MemoryLedger, MemoryStore, RandomSource, StatTable,
    StatVector, Tournament, TournamentSettings,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Replays a fixed sequence of draws.
pub struct Scripted(VecDeque<u32>);

impl Scripted {
    pub fn new(draws: &[u32]) -> Self {
        Self(draws.iter().copied().collect())
    }

    pub fn remaining(&self) -> usize {
        self.0.len()
    }
}

impl RandomSource for Scripted {
    fn below(&mut self, bound: u32) -> u32 {
        let v = self.0.pop_front().expect("random script exhausted");
        assert!(v < bound, "scripted draw {} out of range 0..{}", v, bound);
        v
    }
}

/// Always draws the same value (clamped to the bound).
pub struct Always(pub u32);

impl RandomSource for Always {
    fn below(&mut self, bound: u32) -> u32 {
        self.0.min(bound - 1)
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub fn settings(threshold: usize) -> TournamentSettings {
    TournamentSettings {
        round_duration_secs: 60,
        queue_multiplier: 6,
        survivor_threshold: threshold,
        match_attempts: 4,
    }
}

/// `n` contestants with identical stats.
pub fn uniform_stats(n: usize) -> StatTable {
    StatTable::from_rows(vec![StatVector::new(4, 4, 4, 4, 4); n])
}

/// Every id 1..=n owned by a different owner.
pub fn distinct_owners(n: u32) -> BTreeMap<ContestantId, String> {
    (1..=n).map(|id| (id, format!("owner-{}", id))).collect()
}

pub fn ledger_with_owners(owners: &BTreeMap<ContestantId, String>, pool: u128) -> MemoryLedger {
    let ledger = MemoryLedger::new(pool);
    for (&id, owner) in owners {
        ledger.set_owner(id, owner.clone());
    }
    ledger
}

pub type TestArena<R> = Arena<MemoryLedger, MemoryStore, CollectingSink, R>;

pub struct Harness<R> {
    pub arena: TestArena<R>,
    pub ledger: Arc<MemoryLedger>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<CollectingSink>,
}

pub fn harness<R: RandomSource + Send>(
    stats: StatTable,
    ledger: MemoryLedger,
    threshold: usize,
    rng: R,
) -> Harness<R> {
    let ledger = Arc::new(ledger);
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(CollectingSink::new());
    let arena = Arena::new(
        Tournament::new(settings(threshold), t0()),
        Arc::new(stats),
        ledger.clone(),
        store.clone(),
        sink.clone(),
        rng,
    )
    .with_call_timeout(Duration::from_millis(200));
    Harness {
        arena,
        ledger,
        store,
        sink,
    }
}

/// First instant at which the registration period of a fresh tournament is over.
pub fn queue_over() -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(360)
}

//! End-to-end tests for the timer-driven engine against the in-memory gateways.

mod common;

use battle_arena::engine::SNAPSHOT_KEY;
use battle_arena::{
    restore_tournament, Amount, Arena, ArenaError, CollectingSink, ConsumableFlags, ContestantId,
    EntryRule, GatewayError, LedgerGateway, MatchRecord, MatchResult, MemoryLedger, MemoryStore,
    OwnerId, SnapshotStore, StatTable, StatVector, TickOutcome, Tournament, TournamentError,
    TournamentState, TransactionReceipt,
};
use common::{distinct_owners, harness, ledger_with_owners, queue_over, settings, t0, uniform_stats, Always};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

fn revive() -> ConsumableFlags {
    ConsumableFlags {
        revive: true,
        ..ConsumableFlags::none()
    }
}

#[tokio::test]
async fn waits_for_the_registration_period() {
    let h = harness(uniform_stats(6), ledger_with_owners(&distinct_owners(6), 0), 2, Always(0));
    let outcome = h.arena.tick_at(t0()).await.unwrap();
    assert_eq!(outcome, TickOutcome::Waiting);
    let t = h.arena.tournament().await;
    assert_eq!(t.state, TournamentState::NotStarted);
    assert!(t.registry.is_empty());
    // Waiting ticks do not write the snapshot.
    assert_eq!(h.store.get(SNAPSHOT_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn full_tournament_pays_the_survivors() {
    let ledger = ledger_with_owners(&distinct_owners(6), 1000);
    for id in [1, 3, 4, 5, 6] {
        ledger.set_flags(id, revive());
    }
    let h = harness(uniform_stats(6), ledger, 5, Always(0));

    // Pairings 1v2, 3v4, 5v6; equal power and factor 0 means the first always wins.
    // Only 2 has no revive, so five survive.
    let outcome = h.arena.tick_at(queue_over()).await.unwrap();
    let TickOutcome::PaidOut(payout) = outcome else {
        panic!("expected a payout, got {:?}", outcome);
    };
    assert_eq!(
        payout.winners,
        vec!["owner-1", "owner-3", "owner-4", "owner-5", "owner-6"]
    );
    assert_eq!(payout.share, 200);
    assert_eq!(payout.pool, 1000);
    assert!(payout.receipt.is_some());
    assert_eq!(h.ledger.pool(), 0);
    assert_eq!(h.ledger.disbursements().len(), 1);

    let t = h.arena.tournament().await;
    assert_eq!(t.state, TournamentState::NotStarted);
    assert!(t.is_new_tournament);
    assert!(!t.has_started);
    assert_eq!(t.rounds_count, 0);
    assert!(t.registry.is_empty());
    assert_eq!(t.round_deadline, queue_over() + chrono::Duration::seconds(360));
    assert_eq!(t.winners.len(), 5);

    assert_eq!(t.record(1).wins, 1);
    assert_eq!(t.record(1).tournament_wins, 1);
    assert_eq!(t.record(1).consumables_used, 1);
    assert_eq!(t.record(2).losses, 1);
    assert_eq!(t.record(2).tournament_wins, 0);
    assert_eq!(t.record(4).losses, 1);
    assert_eq!(t.record(4).tournament_wins, 1);

    // Flags of every fighter were used up.
    for id in 1..=6 {
        assert_eq!(h.ledger.flags(id), ConsumableFlags::none());
    }

    let raw = h.store.get("lastBattle:2").await.unwrap().unwrap();
    let record: MatchRecord = serde_json::from_str(&raw).unwrap();
    assert_eq!(record.opponent, 1);
    assert_eq!(record.result, MatchResult::Lost);
    assert_eq!(record.round, 1);

    let raw = h.store.get(SNAPSHOT_KEY).await.unwrap().unwrap();
    let snapshot: Tournament = serde_json::from_str(&raw).unwrap();
    assert_eq!(snapshot.id, t.id);
    assert_eq!(snapshot.state, TournamentState::NotStarted);

    let messages = h.sink.messages();
    assert!(messages.iter().any(|m| m.contains("Round 1 has begun")));
    assert!(messages.iter().any(|m| m.contains("5 winners receive 200 each")));
}

#[tokio::test]
async fn sweep_with_many_survivors_waits_for_the_next_round() {
    let h = harness(uniform_stats(6), ledger_with_owners(&distinct_owners(6), 0), 1, Always(0));
    let outcome = h.arena.tick_at(queue_over()).await.unwrap();
    assert_eq!(outcome, TickOutcome::NextRound { round: 1, survivors: 3 });

    let t = h.arena.tournament().await;
    assert_eq!(t.state, TournamentState::Queuing);
    assert!(t.has_started);
    assert_eq!(t.survivor_count(), 3);
    assert_eq!(t.registry.dead_ids().collect::<Vec<_>>(), vec![2, 4, 6]);
    assert_eq!(t.round_deadline, queue_over() + chrono::Duration::seconds(60));
    // Survivors are eligible again for the next sweep.
    assert_eq!(t.registry.eligible_ids(), vec![1, 3, 5]);

    // Second sweep: 1v3 (3 dies), then 5 finds nobody and sits out.
    let next = queue_over() + chrono::Duration::seconds(60);
    let outcome = h.arena.tick_at(next).await.unwrap();
    assert_eq!(outcome, TickOutcome::NextRound { round: 2, survivors: 2 });
    let t = h.arena.tournament().await;
    assert_eq!(t.record(5).times_sat_out, 1);
    assert!(t.registry.is_dead(3));
}

#[tokio::test]
async fn progress_is_announced_at_milestones() {
    let h = harness(uniform_stats(8), ledger_with_owners(&distinct_owners(8), 0), 2, Always(0));
    h.arena.tick_at(queue_over()).await.unwrap();
    let messages = h.sink.messages();
    for milestone in ["25%", "50%", "75%"] {
        assert_eq!(
            messages.iter().filter(|m| m.contains(milestone)).count(),
            1,
            "milestone {}",
            milestone
        );
    }
    assert!(messages.last().unwrap().contains("4 contestants remain standing"));
}

#[tokio::test]
async fn overlapping_ticks_run_one_sweep() {
    let ledger = ledger_with_owners(&distinct_owners(6), 0);
    ledger.set_latency(Some(Duration::from_millis(5)));
    let h = harness(uniform_stats(6), ledger, 2, Always(0));

    let (a, b) = tokio::join!(h.arena.tick_at(queue_over()), h.arena.tick_at(queue_over()));
    let outcomes = [a.unwrap(), b.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| **o == TickOutcome::Busy).count(), 1);
    assert!(outcomes.contains(&TickOutcome::NextRound { round: 1, survivors: 3 }));

    // Same instant again: the round timer was just reset.
    assert_eq!(h.arena.tick_at(queue_over()).await.unwrap(), TickOutcome::Waiting);
    let begun = h.sink.messages().iter().filter(|m| m.contains("has begun")).count();
    assert_eq!(begun, 1);
}

#[tokio::test]
async fn unreachable_ledger_keeps_the_tournament_closed() {
    let ledger = ledger_with_owners(&distinct_owners(6), 0);
    ledger.set_offline(true);
    let h = harness(uniform_stats(6), ledger, 2, Always(0));

    let err = h.arena.tick_at(queue_over()).await.unwrap_err();
    assert!(matches!(err, ArenaError::Gateway(GatewayError::Unavailable(_))));
    let t = h.arena.tournament().await;
    assert_eq!(t.state, TournamentState::NotStarted);
    assert!(t.is_new_tournament);

    h.ledger.set_offline(false);
    let outcome = h.arena.tick_at(queue_over()).await.unwrap();
    assert_eq!(outcome, TickOutcome::NextRound { round: 1, survivors: 3 });
}

#[tokio::test]
async fn holders_rule_filters_the_population() {
    let ledger = ledger_with_owners(&distinct_owners(6), 0);
    for id in 1..=4 {
        ledger.set_balance(format!("owner-{}", id), 100);
    }
    let h = harness(uniform_stats(6), ledger, 0, Always(0));
    let arena = h.arena.with_entry_rule(EntryRule::Holders { min_balance: 50 });

    arena.tick_at(queue_over()).await.unwrap();
    let t = arena.tournament().await;
    assert_eq!(t.registry.ids(), &[1, 2, 3, 4]);
    assert!(t.owner_of(5).is_none());
}

#[tokio::test]
async fn rejected_payout_is_retried_without_a_new_sweep() {
    let ledger = ledger_with_owners(&distinct_owners(6), 1000);
    ledger.set_reject_disburse(true);
    let h = harness(uniform_stats(6), ledger, 5, Always(0));

    let err = h.arena.tick_at(queue_over()).await.unwrap_err();
    assert!(matches!(err, ArenaError::Gateway(GatewayError::Rejected(_))));
    let t = h.arena.tournament().await;
    assert_eq!(t.state, TournamentState::PayoutPending);
    assert_eq!(t.survivor_count(), 3);

    // Still rejected much later: no sweep runs while the payout is pending.
    let later = queue_over() + chrono::Duration::seconds(3600);
    assert!(h.arena.tick_at(later).await.is_err());
    let t = h.arena.tournament().await;
    assert_eq!(t.state, TournamentState::PayoutPending);
    assert_eq!(t.rounds_count, 0);
    let begun = h.sink.messages().iter().filter(|m| m.contains("has begun")).count();
    assert_eq!(begun, 1);

    h.ledger.set_reject_disburse(false);
    let TickOutcome::PaidOut(payout) = h.arena.tick_at(later).await.unwrap() else {
        panic!("expected a payout");
    };
    assert_eq!(payout.winners, vec!["owner-1", "owner-3", "owner-5"]);
    assert_eq!(payout.share, 333);
    // Remainder rolls over.
    assert_eq!(h.ledger.pool(), 1);
    assert_eq!(h.arena.tournament().await.state, TournamentState::NotStarted);
}

#[tokio::test]
async fn single_owner_population_sits_out_and_is_paid() {
    // Nobody can be paired against its own owner.
    let ledger = MemoryLedger::new(500);
    for id in 1..=3 {
        ledger.set_owner(id, "solo");
    }
    let h = harness(uniform_stats(3), ledger, 5, Always(0));
    let TickOutcome::PaidOut(payout) = h.arena.tick_at(queue_over()).await.unwrap() else {
        panic!("expected a payout");
    };
    assert_eq!(payout.winners, vec!["solo", "solo", "solo"]);
    assert_eq!(payout.share, 166);
    let t = h.arena.tournament().await;
    for id in 1..=3 {
        assert_eq!(t.record(id).times_sat_out, 1);
        assert_eq!(t.record(id).tournament_wins, 1);
    }
}

/// Ledger whose flag lookup can hang for one contestant and whose flag consumption can fail.
struct FlakyLedger {
    inner: MemoryLedger,
    stuck: Option<ContestantId>,
    consume_down: AtomicBool,
}

impl FlakyLedger {
    fn new(inner: MemoryLedger) -> Self {
        Self {
            inner,
            stuck: None,
            consume_down: AtomicBool::new(false),
        }
    }
}

impl LedgerGateway for FlakyLedger {
    async fn owner_of(&self, id: ContestantId) -> Result<Option<OwnerId>, GatewayError> {
        self.inner.owner_of(id).await
    }

    async fn balance_of(&self, owner: &str) -> Result<Amount, GatewayError> {
        self.inner.balance_of(owner).await
    }

    async fn consumable_flags(&self, id: ContestantId) -> Result<ConsumableFlags, GatewayError> {
        if self.stuck == Some(id) {
            std::future::pending::<()>().await;
        }
        self.inner.consumable_flags(id).await
    }

    async fn pool_balance(&self) -> Result<Amount, GatewayError> {
        self.inner.pool_balance().await
    }

    async fn disburse(
        &self,
        winners: &[OwnerId],
        share: Amount,
        count: usize,
    ) -> Result<TransactionReceipt, GatewayError> {
        self.inner.disburse(winners, share, count).await
    }

    async fn consume_flags(&self, ids: &[ContestantId]) -> Result<(), GatewayError> {
        if self.consume_down.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("consume offline".to_string()));
        }
        self.inner.consume_flags(ids).await
    }
}

/// Store that can refuse writes to one key.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    refused: Mutex<Option<String>>,
}

impl SnapshotStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<(), GatewayError> {
        if self.refused.lock().unwrap().as_deref() == Some(key) {
            return Err(GatewayError::Unavailable(format!("{} is read-only", key)));
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        self.inner.delete(key).await
    }
}

#[tokio::test]
async fn timed_out_pairing_is_deferred() {
    let ledger = FlakyLedger {
        stuck: Some(2),
        ..FlakyLedger::new(ledger_with_owners(&distinct_owners(4), 0))
    };
    let arena = Arena::new(
        Tournament::new(settings(1), t0()),
        Arc::new(uniform_stats(4)),
        Arc::new(ledger),
        Arc::new(MemoryStore::new()),
        Arc::new(CollectingSink::new()),
        Always(0),
    )
    .with_call_timeout(Duration::from_millis(50));

    // 1v2 times out and both sit out; 3 then draws benched 1 and scans up to 4.
    let outcome = arena.tick_at(queue_over()).await.unwrap();
    assert_eq!(outcome, TickOutcome::NextRound { round: 1, survivors: 3 });

    let t = arena.tournament().await;
    assert_eq!(t.record(1).times_sat_out, 1);
    assert_eq!(t.record(2).times_sat_out, 1);
    assert!(t.last_matches.get(&1).is_none());
    assert_eq!(t.record(3).wins, 1);
    assert!(t.registry.is_dead(4));
}

#[tokio::test]
async fn failed_flag_consumption_defers_the_pairing() {
    let inner = ledger_with_owners(&distinct_owners(2), 0);
    inner.set_flags(1, revive());
    let ledger = Arc::new(FlakyLedger::new(inner));
    ledger.consume_down.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryStore::new());
    let arena = Arena::new(
        Tournament::new(settings(1), t0()),
        Arc::new(uniform_stats(2)),
        ledger.clone(),
        store.clone(),
        Arc::new(CollectingSink::new()),
        Always(0),
    );

    let outcome = arena.tick_at(queue_over()).await.unwrap();
    assert_eq!(outcome, TickOutcome::NextRound { round: 1, survivors: 2 });
    let t = arena.tournament().await;
    assert!(t.last_matches.is_empty());
    assert!(!t.registry.is_dead(2));
    assert_eq!(t.record(1).times_sat_out, 1);
    assert_eq!(t.record(2).times_sat_out, 1);
    assert_eq!(t.record(1).wins, 0);
    for id in 1..=2 {
        assert_eq!(store.get(&format!("lastBattle:{}", id)).await.unwrap(), None);
    }
    assert_eq!(ledger.inner.flags(1), revive());

    // Next sweep the same pair fights for real.
    ledger.consume_down.store(false, Ordering::SeqCst);
    let next = queue_over() + chrono::Duration::seconds(60);
    let TickOutcome::PaidOut(payout) = arena.tick_at(next).await.unwrap() else {
        panic!("expected a payout");
    };
    assert_eq!(payout.winners, vec!["owner-1"]);
    assert_eq!(ledger.inner.flags(1), ConsumableFlags::none());
    let raw = store.get("lastBattle:2").await.unwrap().unwrap();
    let record: MatchRecord = serde_json::from_str(&raw).unwrap();
    assert_eq!(record.result, MatchResult::Lost);
    assert_eq!(record.round, 2);
}

#[tokio::test]
async fn failed_record_write_defers_the_pairing() {
    let ledger = Arc::new(ledger_with_owners(&distinct_owners(2), 0));
    ledger.set_flags(1, revive());
    let store = Arc::new(FlakyStore::default());
    *store.refused.lock().unwrap() = Some("lastBattle:2".to_string());
    let arena = Arena::new(
        Tournament::new(settings(1), t0()),
        Arc::new(uniform_stats(2)),
        ledger.clone(),
        store.clone(),
        Arc::new(CollectingSink::new()),
        Always(0),
    );

    // The record of 1 is written first and rolled back when the one of 2 fails.
    let outcome = arena.tick_at(queue_over()).await.unwrap();
    assert_eq!(outcome, TickOutcome::NextRound { round: 1, survivors: 2 });
    assert_eq!(store.get("lastBattle:1").await.unwrap(), None);
    assert_eq!(store.get("lastBattle:2").await.unwrap(), None);
    assert_eq!(ledger.flags(1), revive());

    let t = arena.tournament().await;
    assert!(t.last_matches.is_empty());
    assert!(!t.registry.is_dead(2));
    assert_eq!(t.record(1).times_sat_out, 1);
    assert_eq!(t.record(2).times_sat_out, 1);

    *store.refused.lock().unwrap() = None;
    let next = queue_over() + chrono::Duration::seconds(60);
    assert!(matches!(arena.tick_at(next).await.unwrap(), TickOutcome::PaidOut(_)));
    let t = arena.tournament().await;
    assert_eq!(t.last_matches[&2].result, MatchResult::Lost);
    assert_eq!(t.last_matches[&2].round, 2);
    assert!(store.get("lastBattle:1").await.unwrap().is_some());
    assert_eq!(ledger.flags(1), ConsumableFlags::none());
}

#[tokio::test]
async fn rollback_restores_the_previous_record() {
    let ledger = Arc::new(FlakyLedger::new(ledger_with_owners(&distinct_owners(3), 0)));
    for id in 1..=3 {
        ledger.inner.set_flags(id, revive());
    }
    let store = Arc::new(MemoryStore::new());
    let arena = Arena::new(
        Tournament::new(settings(1), t0()),
        Arc::new(uniform_stats(3)),
        ledger.clone(),
        store.clone(),
        Arc::new(CollectingSink::new()),
        Always(0),
    );

    // Round 1: 1 beats 2 (revived), 3 sits out.
    arena.tick_at(queue_over()).await.unwrap();
    let before = store.get("lastBattle:1").await.unwrap().unwrap();

    // Round 2: 1v2 again, but the ledger cannot consume the flags.
    ledger.consume_down.store(true, Ordering::SeqCst);
    ledger.inner.set_flags(1, revive());
    let next = queue_over() + chrono::Duration::seconds(60);
    arena.tick_at(next).await.unwrap();
    assert_eq!(store.get("lastBattle:1").await.unwrap().unwrap(), before);
    let t = arena.tournament().await;
    assert_eq!(t.last_matches[&1].round, 1);
    assert_eq!(t.record(1).wins, 1);
}

#[tokio::test]
async fn zero_power_halts_the_sweep() {
    let stats = StatTable::from_rows(vec![
        StatVector::new(0, 0, 0, 0, 0),
        StatVector::new(0, 0, 0, 0, 0),
        StatVector::new(4, 4, 4, 4, 4),
        StatVector::new(4, 4, 4, 4, 4),
    ]);
    let h = harness(stats, ledger_with_owners(&distinct_owners(4), 0), 1, Always(0));

    let err = h.arena.tick_at(queue_over()).await.unwrap_err();
    assert!(matches!(
        err,
        ArenaError::Invariant(TournamentError::ZeroPower { first: 1, second: 2 })
    ));

    let t = h.arena.tournament().await;
    assert_eq!(t.state, TournamentState::Queuing);
    assert!(t.has_started);
    assert_eq!(t.rounds_count, 0);
    assert!(t.last_matches.is_empty());
    assert!(t.records.is_empty());
    assert_eq!(h.store.get("lastBattle:1").await.unwrap(), None);
    assert!(h.sink.messages().iter().any(|m| m.contains("halted")));
}

#[tokio::test]
async fn restores_a_mid_sweep_snapshot_as_queuing() {
    let store = MemoryStore::new();
    let mut snapshot = Tournament::new(settings(5), t0());
    snapshot.state = TournamentState::RoundActive;
    snapshot.rounds_count = 3;
    store
        .put(SNAPSHOT_KEY, serde_json::to_string(&snapshot).unwrap())
        .await
        .unwrap();

    let restored = restore_tournament(&store, settings(2), t0()).await.unwrap();
    assert_eq!(restored.id, snapshot.id);
    assert_eq!(restored.state, TournamentState::Queuing);
    assert_eq!(restored.rounds_count, 3);
    assert_eq!(restored.settings.survivor_threshold, 2);
}

#[tokio::test]
async fn empty_store_starts_a_new_tournament() {
    let store = MemoryStore::new();
    let t = restore_tournament(&store, settings(5), t0()).await.unwrap();
    assert_eq!(t.state, TournamentState::NotStarted);
    assert!(t.is_new_tournament);
    assert_eq!(t.round_deadline, queue_over());
}

#[tokio::test]
async fn corrupt_snapshot_is_an_error() {
    let store = MemoryStore::new();
    store.put(SNAPSHOT_KEY, "{not json".to_string()).await.unwrap();
    let err = restore_tournament(&store, settings(5), t0()).await.unwrap_err();
    assert!(matches!(err, ArenaError::Snapshot(_)));
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let h = harness(uniform_stats(6), ledger_with_owners(&distinct_owners(6), 0), 2, Always(0));
    let (tx, rx) = watch::channel(false);

    let stopped = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(h.arena.run(Duration::from_millis(10), rx), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
        })
    })
    .await;
    assert!(stopped.is_ok());

    // The first tick found the registration period long over and ran one sweep.
    let t = h.arena.tournament().await;
    assert_eq!(t.state, TournamentState::Queuing);
    assert_eq!(t.rounds_count, 1);
}

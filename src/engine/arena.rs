//! Round scheduler: timer checks, sweeps, payout retries and snapshot persistence.

use crate::config::EntryRule;
use crate::engine::payout::{Payout, PayoutCoordinator};
use crate::engine::{with_timeout, ArenaError};
use crate::gateway::{LedgerGateway, NotificationSink, SnapshotStore};
use crate::logic::{self, Combatant, Matchmaker, RandomSource, SweepVerdict};
use crate::models::{
    ContestantId, MatchRecord, StatTable, Tournament, TournamentError, TournamentSettings,
    TournamentState,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

/// Store key of the serialized tournament.
pub const SNAPSHOT_KEY: &str = "tournament";

/// Progress announcements during a sweep, in percent of the population processed.
const PROGRESS_MILESTONES: [usize; 3] = [25, 50, 75];

fn record_key(id: ContestantId) -> String {
    format!("lastBattle:{}", id)
}

/// What a tick did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick is running a sweep; nothing was done.
    Busy,
    /// The timer has not elapsed yet.
    Waiting,
    /// A sweep finished with too many survivors; `round` is the new `rounds_count`.
    NextRound { round: u32, survivors: usize },
    /// The tournament ended and the payout was confirmed.
    PaidOut(Payout),
}

struct EngineState<R> {
    tournament: Tournament,
    rng: R,
}

/// Load the persisted tournament, or start a fresh one when the store has none.
///
/// A snapshot taken mid-sweep resumes as `Queuing`; the configured settings replace the
/// persisted ones.
pub async fn restore_tournament<S: SnapshotStore>(
    store: &S,
    settings: TournamentSettings,
    now: DateTime<Utc>,
) -> Result<Tournament, ArenaError> {
    let Some(raw) = store.get(SNAPSHOT_KEY).await? else {
        log::info!("No tournament snapshot found, starting a new tournament");
        return Ok(Tournament::new(settings, now));
    };
    let mut tournament: Tournament = serde_json::from_str(&raw)?;
    if tournament.settings != settings {
        log::info!("Applying configured settings over the snapshot's");
        tournament.settings = settings;
    }
    logic::abort_sweep(&mut tournament);
    log::info!(
        "Restored tournament {} in state {:?} (round {}, {} survivors)",
        tournament.id,
        tournament.state,
        tournament.rounds_count,
        tournament.survivor_count()
    );
    Ok(tournament)
}

/// The battle engine. One instance runs one recurring tournament.
pub struct Arena<L, S, N, R = StdRng> {
    ledger: Arc<L>,
    store: Arc<S>,
    sink: Arc<N>,
    stats: Arc<StatTable>,
    entry_rule: EntryRule,
    call_timeout: Duration,
    state: Mutex<EngineState<R>>,
}

impl<L, S, N, R> Arena<L, S, N, R>
where
    L: LedgerGateway,
    S: SnapshotStore,
    N: NotificationSink,
    R: RandomSource + Send,
{
    pub fn new(
        tournament: Tournament,
        stats: Arc<StatTable>,
        ledger: Arc<L>,
        store: Arc<S>,
        sink: Arc<N>,
        rng: R,
    ) -> Self {
        Self {
            ledger,
            store,
            sink,
            stats,
            entry_rule: EntryRule::Everyone,
            call_timeout: Duration::from_secs(5),
            state: Mutex::new(EngineState { tournament, rng }),
        }
    }

    pub fn with_entry_rule(mut self, entry_rule: EntryRule) -> Self {
        self.entry_rule = entry_rule;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Copy of the current tournament state (waits for a running sweep to finish).
    pub async fn tournament(&self) -> Tournament {
        self.state.lock().await.tournament.clone()
    }

    /// Tick the scheduler loop every `poll` until `shutdown` flips to true.
    ///
    /// Shutdown is only observed between ticks, never in the middle of a sweep.
    pub async fn run(&self, poll: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(poll);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log::info!("Arena scheduler started (poll every {:?})", poll);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => break,
            }

            match self.tick().await {
                Ok(TickOutcome::Waiting) | Ok(TickOutcome::Busy) => {}
                Ok(outcome) => log::info!("Tick: {:?}", outcome),
                Err(ArenaError::Gateway(e)) => log::warn!("Tick deferred: {}", e),
                Err(e) => log::error!("Tick failed: {}", e),
            }
        }
        log::info!("Arena scheduler stopped");
    }

    pub async fn tick(&self) -> Result<TickOutcome, ArenaError> {
        self.tick_at(Utc::now()).await
    }

    /// Advance the state machine as of `now`. A tick that overlaps a running one is a no-op.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickOutcome, ArenaError> {
        let Ok(mut guard) = self.state.try_lock() else {
            log::debug!("Tick skipped: a sweep is already running");
            return Ok(TickOutcome::Busy);
        };
        let EngineState { tournament, rng } = &mut *guard;

        let result = self.advance(tournament, rng, now).await;
        if !matches!(result, Ok(TickOutcome::Waiting)) {
            self.save_snapshot(tournament).await;
        }
        result
    }

    async fn advance(
        &self,
        tournament: &mut Tournament,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, ArenaError> {
        if tournament.state == TournamentState::PayoutPending {
            return self.settle_payout(tournament, now).await;
        }
        if !tournament.has_timer_elapsed(now) {
            return Ok(TickOutcome::Waiting);
        }

        match tournament.state {
            TournamentState::NotStarted => self.open(tournament).await?,
            TournamentState::RoundActive => {
                log::warn!("Found an interrupted sweep, resuming it");
                logic::abort_sweep(tournament);
            }
            _ => {}
        }
        self.sweep(tournament, rng, now).await
    }

    /// Queue every contestant that passes the entry rule.
    async fn open(&self, tournament: &mut Tournament) -> Result<(), ArenaError> {
        let mut population = Vec::with_capacity(self.stats.len());
        for id in self.stats.ids() {
            let Some(owner) =
                with_timeout(self.call_timeout, "owner_of", self.ledger.owner_of(id)).await?
            else {
                continue;
            };
            if let EntryRule::Holders { min_balance } = self.entry_rule {
                let balance =
                    with_timeout(self.call_timeout, "balance_of", self.ledger.balance_of(&owner))
                        .await?;
                if balance < min_balance {
                    continue;
                }
            }
            population.push((id, owner));
        }

        if population.is_empty() {
            log::warn!("No contestant qualifies for the new tournament");
        }
        let count = population.len();
        logic::open_tournament(tournament, population)?;
        log::info!("Tournament {} opened with {} contestants", tournament.id, count);
        Ok(())
    }

    /// One full pairing pass over the population.
    async fn sweep(
        &self,
        tournament: &mut Tournament,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, ArenaError> {
        logic::begin_sweep(tournament)?;
        let round = tournament.rounds_count + 1;
        let mut matchmaker = Matchmaker::new(&tournament.registry, tournament.settings.match_attempts);
        self.announce(format!(
            "⚔️ Round {} has begun! {} contestants step into the arena.",
            round,
            matchmaker.pool_size()
        ))
        .await;

        let order = tournament.registry.ids().to_vec();
        let mut milestones = PROGRESS_MILESTONES.iter().peekable();
        let mut fought = 0usize;
        for (index, &first) in order.iter().enumerate() {
            if tournament.registry.is_eligible(first) && !matchmaker.is_benched(first) {
                if let Some(owner) = tournament.owner_of(first).cloned() {
                    let second = matchmaker.select_opponent(
                        &tournament.registry,
                        &tournament.owners,
                        first,
                        &owner,
                        rng,
                    );
                    match second {
                        None => log::debug!("Contestant {} found no opponent this round", first),
                        Some(second) => match self.fight(tournament, rng, round, first, second, now).await {
                            Ok(()) => fought += 1,
                            Err(ArenaError::Gateway(e)) => {
                                log::warn!(
                                    "Match {} vs {} deferred to the next round: {}",
                                    first,
                                    second,
                                    e
                                );
                                matchmaker.bench(first);
                                matchmaker.bench(second);
                            }
                            Err(e) => {
                                log::error!("Round {} halted at {} vs {}: {}", round, first, second, e);
                                logic::abort_sweep(tournament);
                                self.announce(format!(
                                    "🛑 Round {} has been halted for investigation.",
                                    round
                                ))
                                .await;
                                return Err(e);
                            }
                        },
                    }
                }
            }

            let percent = (index + 1) * 100 / order.len();
            while let Some(&&milestone) = milestones.peek() {
                if percent < milestone {
                    break;
                }
                milestones.next();
                self.announce(format!("⏳ Round {} is {}% complete.", round, milestone)).await;
            }
        }

        let deferred = matchmaker.benched().count();
        let verdict = logic::finish_sweep(tournament, now)?;
        log::info!(
            "Round {} finished: {} matches, {} deferred, {} survivors",
            round,
            fought,
            deferred,
            tournament.survivor_count()
        );

        match verdict {
            SweepVerdict::NextRound { survivors } => {
                self.announce(format!(
                    "🏁 Round {} is over! {} contestants remain standing.",
                    round, survivors
                ))
                .await;
                Ok(TickOutcome::NextRound {
                    round: tournament.rounds_count,
                    survivors,
                })
            }
            SweepVerdict::Payout { survivors } => {
                self.announce(format!(
                    "🏆 Round {} is over and only {} contestants remain! Paying out the winners.",
                    round,
                    survivors.len()
                ))
                .await;
                self.settle_payout(tournament, now).await
            }
        }
    }

    /// Resolve one pairing. The outcome only counts once both records are stored and the
    /// flags are consumed; on any failure before that the records written so far are rolled
    /// back and nothing changes in the tournament.
    async fn fight(
        &self,
        tournament: &mut Tournament,
        rng: &mut R,
        round: u32,
        first: ContestantId,
        second: ContestantId,
        now: DateTime<Utc>,
    ) -> Result<(), ArenaError> {
        let (first_flags, second_flags) = tokio::try_join!(
            with_timeout(self.call_timeout, "consumable_flags", self.ledger.consumable_flags(first)),
            with_timeout(self.call_timeout, "consumable_flags", self.ledger.consumable_flags(second)),
        )?;
        let a = Combatant::new(
            first,
            self.stats.get(first).ok_or(TournamentError::UnknownContestant(first))?,
            first_flags,
        );
        let b = Combatant::new(
            second,
            self.stats.get(second).ok_or(TournamentError::UnknownContestant(second))?,
            second_flags,
        );

        let outcome = logic::resolve(&tournament.registry, &a, &b, rng)?;
        let records = logic::match_records(&a, &b, &outcome, round, now);

        let mut written = Vec::with_capacity(2);
        for (id, record) in [(first, &records.0), (second, &records.1)] {
            if let Err(e) = self.persist_record(id, record).await {
                self.roll_back_records(tournament, &written).await;
                return Err(e);
            }
            written.push(id);
        }
        if outcome.consumes_flags() {
            let consumed = with_timeout(
                self.call_timeout,
                "consume_flags",
                self.ledger.consume_flags(&[first, second]),
            )
            .await;
            if let Err(e) = consumed {
                self.roll_back_records(tournament, &written).await;
                return Err(e.into());
            }
        }

        log::debug!("{} vs {}: {:?}", first, second, outcome);
        logic::apply_outcome(tournament, &a, &b, &outcome, records);
        Ok(())
    }

    /// Put back the previous last battle of each id, or drop the key if there was none.
    async fn roll_back_records(&self, tournament: &Tournament, ids: &[ContestantId]) {
        for &id in ids {
            let key = record_key(id);
            let restored = match tournament.last_matches.get(&id).map(serde_json::to_string) {
                Some(Ok(value)) => {
                    with_timeout(self.call_timeout, "store_put", self.store.put(&key, value)).await
                }
                Some(Err(e)) => {
                    log::error!("Cannot encode last battle of {}: {}", id, e);
                    continue;
                }
                None => {
                    with_timeout(self.call_timeout, "store_delete", self.store.delete(&key)).await
                }
            };
            if let Err(e) = restored {
                log::warn!("Last battle of {} not rolled back: {}", id, e);
            }
        }
    }

    /// Attempt the pending payout; the tournament only resets once the ledger confirms.
    async fn settle_payout(
        &self,
        tournament: &mut Tournament,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, ArenaError> {
        let survivors = tournament.registry.survivors();
        let coordinator = PayoutCoordinator::new(self.ledger.as_ref(), self.call_timeout);
        let payout = match coordinator.payout(&survivors).await {
            Ok(payout) => payout,
            Err(e) => {
                log::warn!("Payout for {} survivors deferred: {}", survivors.len(), e);
                return Err(e.into());
            }
        };

        logic::complete_payout(tournament, payout.winners.clone(), now)?;
        let message = match &payout.receipt {
            Some(receipt) => format!(
                "💰 The tournament is over! {} winners receive {} each (tx {}). {} stays in the pool.",
                payout.winners.len(),
                payout.share,
                receipt.tx_hash,
                logic::remainder(payout.pool, payout.winners.len())
            ),
            None => "💀 The tournament is over and nobody survived.".to_string(),
        };
        self.announce(message).await;
        Ok(TickOutcome::PaidOut(payout))
    }

    async fn persist_record(&self, id: ContestantId, record: &MatchRecord) -> Result<(), ArenaError> {
        let value = serde_json::to_string(record)?;
        let key = record_key(id);
        with_timeout(self.call_timeout, "store_put", self.store.put(&key, value)).await?;
        Ok(())
    }

    /// Best effort: observers read the snapshot as eventually consistent.
    async fn save_snapshot(&self, tournament: &Tournament) {
        let value = match serde_json::to_string(tournament) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Cannot encode tournament snapshot: {}", e);
                return;
            }
        };
        if let Err(e) =
            with_timeout(self.call_timeout, "store_put", self.store.put(SNAPSHOT_KEY, value)).await
        {
            log::warn!("Tournament snapshot not saved: {}", e);
        }
    }

    /// Fire and forget.
    async fn announce(&self, message: String) {
        if let Err(e) = with_timeout(self.call_timeout, "notify", self.sink.send(message)).await {
            log::warn!("Announcement not delivered: {}", e);
        }
    }
}

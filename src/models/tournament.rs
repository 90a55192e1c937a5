//! Tournament and TournamentState.

use crate::models::contestant::{ContestantId, ContestantRecord, OwnerId};
use crate::models::record::MatchRecord;
use crate::models::registry::PopulationRegistry;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Invariant violations inside the engine. Any of these halts the current sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TournamentError {
    /// Combat was requested for an eliminated contestant.
    ContestantDead(ContestantId),
    /// Both sides of a match have zero total power.
    ZeroPower { first: ContestantId, second: ContestantId },
    /// Id has no stat row or is not registered.
    UnknownContestant(ContestantId),
    /// Tournament is not in a state that allows this action.
    InvalidState,
}

impl std::fmt::Display for TournamentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TournamentError::ContestantDead(id) => write!(f, "Contestant {} is already dead", id),
            TournamentError::ZeroPower { first, second } => {
                write!(f, "Contestants {} and {} have zero combined power", first, second)
            }
            TournamentError::UnknownContestant(id) => write!(f, "Unknown contestant {}", id),
            TournamentError::InvalidState => write!(f, "Invalid state for this action"),
        }
    }
}

impl std::error::Error for TournamentError {}

/// Unique identifier for a tournament.
pub type TournamentId = Uuid;

/// Current phase of the tournament.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentState {
    /// Registration period; the population is queued once the timer elapses.
    #[default]
    NotStarted,
    /// Waiting for the round timer before the next sweep.
    Queuing,
    /// A sweep is pairing and resolving matches.
    RoundActive,
    /// Survivors are at or below the threshold; waiting for the payout to confirm.
    PayoutPending,
}

/// Longest round or registration period, one year.
pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

/// Timing and threshold knobs, fixed for the lifetime of the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TournamentSettings {
    pub round_duration_secs: u64,
    /// The registration period lasts this many rounds.
    pub queue_multiplier: u32,
    /// Payout triggers when survivors are at or below this count.
    pub survivor_threshold: usize,
    /// Random draws before the matchmaker falls back to a linear scan.
    pub match_attempts: u32,
}

impl Default for TournamentSettings {
    fn default() -> Self {
        Self {
            round_duration_secs: 600,
            queue_multiplier: 6,
            survivor_threshold: 5,
            match_attempts: 4,
        }
    }
}

impl TournamentSettings {
    /// Round duration, capped at [`MAX_PERIOD_SECS`].
    pub fn round_duration(&self) -> Duration {
        Duration::seconds(self.round_duration_secs.min(MAX_PERIOD_SECS) as i64)
    }

    /// Registration period, capped at [`MAX_PERIOD_SECS`].
    pub fn queue_duration(&self) -> Duration {
        let secs = self
            .round_duration_secs
            .saturating_mul(u64::from(self.queue_multiplier))
            .min(MAX_PERIOD_SECS);
        Duration::seconds(secs as i64)
    }
}

/// Full tournament state. Serialized as-is for the persisted snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub state: TournamentState,
    pub settings: TournamentSettings,
    pub registry: PopulationRegistry,
    /// Completed sweeps in the current tournament.
    pub rounds_count: u32,
    /// True until the population has been queued.
    pub is_new_tournament: bool,
    /// True once the first sweep of the tournament has begun.
    pub has_started: bool,
    pub round_deadline: DateTime<Utc>,
    /// Owner of each queued contestant, looked up when the tournament opens.
    pub owners: BTreeMap<ContestantId, OwnerId>,
    /// Owners paid in the last payout, one entry per surviving contestant.
    pub winners: Vec<OwnerId>,
    /// Battle history; kept across tournaments.
    pub records: BTreeMap<ContestantId, ContestantRecord>,
    /// Last match per contestant; kept across tournaments.
    pub last_matches: BTreeMap<ContestantId, MatchRecord>,
}

impl Tournament {
    /// Create a new tournament whose registration period ends one queue duration after `now`.
    pub fn new(settings: TournamentSettings, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: TournamentState::NotStarted,
            settings,
            registry: PopulationRegistry::new(),
            rounds_count: 0,
            is_new_tournament: true,
            has_started: false,
            round_deadline: now + settings.queue_duration(),
            owners: BTreeMap::new(),
            winners: Vec::new(),
            records: BTreeMap::new(),
            last_matches: BTreeMap::new(),
        }
    }

    /// Whether the current timer (registration or round) has run out.
    pub fn has_timer_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.round_deadline
    }

    /// Time left on the current timer; zero once elapsed.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.round_deadline - now).max(Duration::zero())
    }

    pub fn owner_of(&self, id: ContestantId) -> Option<&OwnerId> {
        self.owners.get(&id)
    }

    /// Mutable record for a contestant, created on first use.
    pub fn record_mut(&mut self, id: ContestantId) -> &mut ContestantRecord {
        self.records.entry(id).or_default()
    }

    pub fn record(&self, id: ContestantId) -> ContestantRecord {
        self.records.get(&id).cloned().unwrap_or_default()
    }

    pub fn survivor_count(&self) -> usize {
        self.registry.count(|m| !m.dead)
    }
}

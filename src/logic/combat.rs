//! Combat resolution: skip rule, one-match modifiers, weighted outcome and the death rule.

use crate::logic::random::RandomSource;
use crate::models::{
    ConsumableFlags, ContestantId, MatchRecord, MatchResult, PopulationRegistry, StatVector,
    TournamentError, MAX_STAT, STAT_SLOTS,
};
use chrono::{DateTime, Utc};

/// Win chance (percent) of the side with more total power.
pub const FAVOURITE_WIN_PERCENT: u32 = 70;

/// Win chance (percent) of either side when powers are equal.
pub const EVEN_WIN_PERCENT: u32 = 50;

/// One side of a match: permanent stats plus the flags it holds going in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Combatant {
    pub id: ContestantId,
    pub stats: StatVector,
    pub flags: ConsumableFlags,
}

impl Combatant {
    pub fn new(id: ContestantId, stats: StatVector, flags: ConsumableFlags) -> Self {
        Self { id, stats, flags }
    }
}

/// How a match ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CombatOutcome {
    /// A skip flag turned the match into a no-op. Both survive and keep their flags.
    Skipped,
    Decided {
        winner: ContestantId,
        loser: ContestantId,
        /// False when the loser's own revive flag saved it.
        loser_dies: bool,
        first_power: u64,
        second_power: u64,
        /// The `[0, 100)` roll that decided the match.
        factor: u32,
    },
}

impl CombatOutcome {
    /// Result from the perspective of `id`.
    pub fn result_for(&self, id: ContestantId) -> MatchResult {
        match self {
            CombatOutcome::Skipped => MatchResult::Skipped,
            CombatOutcome::Decided { winner, .. } if *winner == id => MatchResult::Won,
            CombatOutcome::Decided { .. } => MatchResult::Lost,
        }
    }

    /// Whether flags of both participants are used up by this outcome.
    pub fn consumes_flags(&self) -> bool {
        matches!(self, CombatOutcome::Decided { .. })
    }

    pub fn dead(&self) -> Option<ContestantId> {
        match self {
            CombatOutcome::Decided {
                loser,
                loser_dies: true,
                ..
            } => Some(*loser),
            _ => None,
        }
    }
}

/// A skip flag holds unless the opponent counters it with maximize.
pub fn is_skipped(first: &ConsumableFlags, second: &ConsumableFlags) -> bool {
    (first.skip && !second.maximize) || (second.skip && !first.maximize)
}

/// Working copy of `stats` with one-match modifiers applied.
///
/// Randomize raises two distinct random slots to [`MAX_STAT`]; maximize then raises all of them.
pub fn apply_modifiers<R: RandomSource + ?Sized>(
    stats: StatVector,
    flags: &ConsumableFlags,
    rng: &mut R,
) -> StatVector {
    let mut working = stats;
    if flags.randomize {
        let first = rng.below(STAT_SLOTS as u32) as usize;
        let mut second = rng.below(STAT_SLOTS as u32 - 1) as usize;
        if second >= first {
            second += 1;
        }
        working.set_slot(first, MAX_STAT);
        working.set_slot(second, MAX_STAT);
    }
    if flags.maximize {
        working.maximize();
    }
    working
}

/// Biased coin: the stronger side wins on 70 of 100 factors, equal powers split 50/50.
pub fn first_wins(first_power: u64, second_power: u64, factor: u32) -> bool {
    use std::cmp::Ordering::*;
    match first_power.cmp(&second_power) {
        Greater => factor < FAVOURITE_WIN_PERCENT,
        Less => factor >= 100 - FAVOURITE_WIN_PERCENT,
        Equal => factor < EVEN_WIN_PERCENT,
    }
}

/// Resolve one match between two contestants that are both still in the running.
///
/// Stats are modified on working copies only; `first.stats` and `second.stats` come back
/// untouched whatever the outcome.
pub fn resolve<R: RandomSource + ?Sized>(
    registry: &PopulationRegistry,
    first: &Combatant,
    second: &Combatant,
    rng: &mut R,
) -> Result<CombatOutcome, TournamentError> {
    for id in [first.id, second.id] {
        if registry.is_dead(id) {
            return Err(TournamentError::ContestantDead(id));
        }
    }

    if is_skipped(&first.flags, &second.flags) {
        return Ok(CombatOutcome::Skipped);
    }

    let first_stats = apply_modifiers(first.stats, &first.flags, rng);
    let second_stats = apply_modifiers(second.stats, &second.flags, rng);
    let first_power = first_stats.power();
    let second_power = second_stats.power();
    if first_power + second_power == 0 {
        return Err(TournamentError::ZeroPower {
            first: first.id,
            second: second.id,
        });
    }

    let factor = rng.below(100);
    let (winner, loser) = if first_wins(first_power, second_power, factor) {
        (first, second)
    } else {
        (second, first)
    };

    Ok(CombatOutcome::Decided {
        winner: winner.id,
        loser: loser.id,
        loser_dies: !loser.flags.revive,
        first_power,
        second_power,
        factor,
    })
}

/// One record per participant, each from its own perspective.
pub fn match_records(
    first: &Combatant,
    second: &Combatant,
    outcome: &CombatOutcome,
    round: u32,
    fought_at: DateTime<Utc>,
) -> (MatchRecord, MatchRecord) {
    let first_result = outcome.result_for(first.id);
    (
        MatchRecord::new(round, second.id, first_result, first.flags, fought_at),
        MatchRecord::new(round, first.id, first_result.inverse(), second.flags, fought_at),
    )
}

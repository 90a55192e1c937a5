//! Tournament lifecycle: queuing the population, applying match verdicts, closing sweeps,
//! and resetting after a confirmed payout.

use crate::logic::combat::{Combatant, CombatOutcome};
use crate::models::{
    ContestantId, MatchRecord, OwnerId, PopulationRegistry, Tournament, TournamentError,
    TournamentState,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What happens after a sweep closes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SweepVerdict {
    /// Too many survivors; the next sweep waits for the round timer.
    NextRound { survivors: usize },
    /// Survivors are at or below the threshold; payout is pending for these ids.
    Payout { survivors: Vec<ContestantId> },
}

/// Queue the population for a new tournament (NotStarted -> Queuing).
///
/// `population` holds every contestant that passed the entry rule, with its owner.
pub fn open_tournament(
    tournament: &mut Tournament,
    population: impl IntoIterator<Item = (ContestantId, OwnerId)>,
) -> Result<(), TournamentError> {
    if tournament.state != TournamentState::NotStarted || !tournament.is_new_tournament {
        return Err(TournamentError::InvalidState);
    }
    tournament.owners = population.into_iter().collect();
    tournament.registry = PopulationRegistry::with_population(tournament.owners.keys().copied());
    tournament.rounds_count = 0;
    tournament.is_new_tournament = false;
    tournament.state = TournamentState::Queuing;
    Ok(())
}

/// Start a sweep (Queuing -> RoundActive).
pub fn begin_sweep(tournament: &mut Tournament) -> Result<(), TournamentError> {
    if tournament.state != TournamentState::Queuing {
        return Err(TournamentError::InvalidState);
    }
    tournament.state = TournamentState::RoundActive;
    tournament.has_started = true;
    Ok(())
}

/// Write one resolved pairing back: registry status, battle records and last matches.
pub fn apply_outcome(
    tournament: &mut Tournament,
    first: &Combatant,
    second: &Combatant,
    outcome: &CombatOutcome,
    records: (MatchRecord, MatchRecord),
) {
    match *outcome {
        CombatOutcome::Skipped => {
            for id in [first.id, second.id] {
                tournament.registry.mark_alive(id);
                tournament.record_mut(id).add_skip();
            }
        }
        CombatOutcome::Decided {
            winner,
            loser,
            loser_dies,
            ..
        } => {
            tournament.registry.mark_alive(winner);
            tournament.record_mut(winner).add_win();
            tournament.record_mut(loser).add_loss();
            if loser_dies {
                tournament.registry.mark_dead(loser);
            } else {
                tournament.registry.mark_alive(loser);
            }
            for c in [first, second] {
                tournament.record_mut(c.id).record_consumed(&c.flags);
            }
        }
    }

    let (first_record, second_record) = records;
    tournament.last_matches.insert(first.id, first_record);
    tournament.last_matches.insert(second.id, second_record);
}

/// Halt a sweep after an invariant violation (RoundActive -> Queuing).
///
/// Pairings already applied stay applied and the deadline is untouched, so the next tick
/// continues the sweep with whoever is still eligible.
pub fn abort_sweep(tournament: &mut Tournament) {
    if tournament.state == TournamentState::RoundActive {
        tournament.state = TournamentState::Queuing;
    }
}

/// Close the current sweep: record sit-outs, count survivors and pick the next phase.
pub fn finish_sweep(
    tournament: &mut Tournament,
    now: DateTime<Utc>,
) -> Result<SweepVerdict, TournamentError> {
    if tournament.state != TournamentState::RoundActive {
        return Err(TournamentError::InvalidState);
    }

    for id in tournament.registry.eligible_ids() {
        tournament.record_mut(id).record_sat_out();
    }

    let survivors = tournament.registry.survivors();
    if survivors.len() <= tournament.settings.survivor_threshold {
        tournament.state = TournamentState::PayoutPending;
        return Ok(SweepVerdict::Payout { survivors });
    }

    tournament.rounds_count += 1;
    tournament.registry.start_round();
    tournament.round_deadline = now + tournament.settings.round_duration();
    tournament.state = TournamentState::Queuing;
    Ok(SweepVerdict::NextRound {
        survivors: survivors.len(),
    })
}

/// Finish the tournament once the payout is confirmed (PayoutPending -> NotStarted).
pub fn complete_payout(
    tournament: &mut Tournament,
    winners: Vec<OwnerId>,
    now: DateTime<Utc>,
) -> Result<(), TournamentError> {
    if tournament.state != TournamentState::PayoutPending {
        return Err(TournamentError::InvalidState);
    }

    for id in tournament.registry.survivors() {
        tournament.record_mut(id).record_tournament_win();
    }

    tournament.winners = winners;
    tournament.registry.reset();
    tournament.owners.clear();
    tournament.id = Uuid::new_v4();
    tournament.rounds_count = 0;
    tournament.is_new_tournament = true;
    tournament.has_started = false;
    tournament.round_deadline = now + tournament.settings.queue_duration();
    tournament.state = TournamentState::NotStarted;
    Ok(())
}

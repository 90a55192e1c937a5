//! Read-only views over a tournament snapshot for status queries.

use crate::models::{
    ContestantId, ContestantRecord, MatchRecord, StatVector, Tournament, TournamentState,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of leaderboard rows.
pub const LEADERBOARD_SIZE: usize = 30;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: ContestantId,
    pub tournament_wins: u32,
    pub wins: u32,
}

/// Surviving contestants ranked by tournament wins, then battle wins, then id.
///
/// Between tournaments (empty registry) the last winners' ids are not known here, so the
/// board is empty.
pub fn leaderboard(tournament: &Tournament, limit: usize) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(ContestantId, ContestantRecord)> = tournament
        .registry
        .survivors()
        .into_iter()
        .map(|id| (id, tournament.record(id)))
        .collect();
    rows.sort_by(|(a_id, a), (b_id, b)| {
        b.tournament_wins
            .cmp(&a.tournament_wins)
            .then(b.wins.cmp(&a.wins))
            .then(a_id.cmp(b_id))
    });
    rows.into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (id, record))| LeaderboardEntry {
            rank: i + 1,
            id,
            tournament_wins: record.tournament_wins,
            wins: record.wins,
        })
        .collect()
}

/// Life status of one contestant within the current tournament.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
    /// Not part of the running tournament.
    Unregistered,
    Alive,
    Dead,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ContestantStatus {
    pub id: ContestantId,
    pub stats: StatVector,
    pub status: LifeStatus,
    pub record: ContestantRecord,
    pub last_match: Option<MatchRecord>,
}

pub fn contestant_status(
    tournament: &Tournament,
    id: ContestantId,
    stats: StatVector,
) -> ContestantStatus {
    let status = if tournament.registry.is_dead(id) {
        LifeStatus::Dead
    } else if tournament.registry.contains(id) {
        LifeStatus::Alive
    } else {
        LifeStatus::Unregistered
    };
    ContestantStatus {
        id,
        stats,
        status,
        record: tournament.record(id),
        last_match: tournament.last_matches.get(&id).cloned(),
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TimerStatus {
    pub state: TournamentState,
    pub round: u32,
    pub seconds_remaining: i64,
    pub message: String,
}

pub fn timer_status(tournament: &Tournament, now: DateTime<Utc>) -> TimerStatus {
    let remaining = tournament.time_remaining(now).num_seconds();
    let message = match tournament.state {
        TournamentState::RoundActive => "The round is being fought!".to_string(),
        TournamentState::PayoutPending => "The tournament is over, paying out the winners.".to_string(),
        _ if remaining == 0 => "The timer has passed! The next round begins shortly.".to_string(),
        TournamentState::NotStarted => {
            format!("A new tournament will begin in {}", format_countdown(remaining))
        }
        TournamentState::Queuing => {
            format!("The next round will begin in {}", format_countdown(remaining))
        }
    };
    TimerStatus {
        state: tournament.state,
        round: tournament.rounds_count,
        seconds_remaining: remaining,
        message,
    }
}

/// `m:ss minutes`.
fn format_countdown(seconds: i64) -> String {
    format!("{}:{:02} minutes", seconds / 60, seconds % 60)
}

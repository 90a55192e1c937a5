//! Match records: the outcome of one pairing as seen by one participant.

use crate::models::contestant::{ConsumableFlags, ContestantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a match record.
pub type MatchId = Uuid;

/// Result of a match from one participant's perspective.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Won,
    Lost,
    Skipped,
}

impl MatchResult {
    /// The same match as seen by the opponent.
    pub fn inverse(self) -> Self {
        match self {
            MatchResult::Won => MatchResult::Lost,
            MatchResult::Lost => MatchResult::Won,
            MatchResult::Skipped => MatchResult::Skipped,
        }
    }
}

/// Last battle details persisted per participant for display.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    /// Sweep the match was fought in, counted from 1 as in the announcements.
    pub round: u32,
    pub opponent: ContestantId,
    pub result: MatchResult,
    /// This participant's own flags at the start of the match.
    pub flags: ConsumableFlags,
    pub fought_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn new(
        round: u32,
        opponent: ContestantId,
        result: MatchResult,
        flags: ConsumableFlags,
        fought_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            round,
            opponent,
            result,
            flags,
            fought_at,
        }
    }
}

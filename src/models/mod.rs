//! Data structures for the arena: contestants, stats, registry, match records, tournament state.

mod contestant;
mod record;
mod registry;
mod stats;
mod tournament;

pub use contestant::{Amount, ConsumableFlags, ContestantId, ContestantRecord, OwnerId};
pub use record::{MatchId, MatchRecord, MatchResult};
pub use registry::{Membership, PopulationRegistry};
pub use stats::{StatTable, StatTableError, StatVector, FIRST_ID, MAX_STAT, STAT_SLOTS};
pub use tournament::{
    Tournament, TournamentError, TournamentId, TournamentSettings, TournamentState,
    MAX_PERIOD_SECS,
};

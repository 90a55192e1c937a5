//! Tournament business logic: matchmaking, combat, round lifecycle, payout split, status views.
//!
//! Everything here is synchronous and free of I/O; the engine module drives it.

mod combat;
mod matchmaker;
mod payout;
mod random;
mod round;
mod status;

pub use combat::{
    apply_modifiers, first_wins, is_skipped, match_records, resolve, CombatOutcome, Combatant,
    EVEN_WIN_PERCENT, FAVOURITE_WIN_PERCENT,
};
pub use matchmaker::Matchmaker;
pub use payout::{compute_share, remainder};
pub use random::RandomSource;
pub use round::{
    abort_sweep, apply_outcome, begin_sweep, complete_payout, finish_sweep, open_tournament,
    SweepVerdict,
};
pub use status::{
    contestant_status, leaderboard, timer_status, ContestantStatus, LeaderboardEntry, LifeStatus,
    TimerStatus, LEADERBOARD_SIZE,
};

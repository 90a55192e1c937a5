//! Contestant identifiers, consumable flags and the per-contestant battle record.

use serde::{Deserialize, Serialize};

/// Unique identifier for a contestant (dense range starting at 1).
pub type ContestantId = u32;

/// Owner of a contestant (wallet address on the ledger).
pub type OwnerId = String;

/// Token amount in the ledger's smallest unit.
pub type Amount = u128;

/// One-time modifiers a contestant carries into its next resolved match.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct ConsumableFlags {
    /// Turns the match into a no-op unless the opponent holds `maximize`.
    pub skip: bool,
    /// Two random stat slots go to the maximum for one match.
    pub randomize: bool,
    /// Every stat slot goes to the maximum for one match.
    pub maximize: bool,
    /// Survive a lost match.
    pub revive: bool,
}

impl ConsumableFlags {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.skip || self.randomize || self.maximize || self.revive
    }

    /// Number of flags set; each one is used up by a resolved match.
    pub fn count(&self) -> u32 {
        [self.skip, self.randomize, self.maximize, self.revive]
            .iter()
            .filter(|f| **f)
            .count() as u32
    }
}

/// Battle history of a contestant, kept across tournaments.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContestantRecord {
    pub wins: u32,
    pub losses: u32,
    pub skips: u32,
    /// Tournaments this contestant survived until payout.
    pub tournament_wins: u32,
    pub times_sat_out: u32,
    pub consumables_used: u32,
}

impl ContestantRecord {
    /// Record a won match.
    pub fn add_win(&mut self) {
        self.wins += 1;
    }

    /// Record a lost match (the contestant may still have been revived).
    pub fn add_loss(&mut self) {
        self.losses += 1;
    }

    pub fn add_skip(&mut self) {
        self.skips += 1;
    }

    /// Record that this contestant found no opponent in a sweep.
    pub fn record_sat_out(&mut self) {
        self.times_sat_out += 1;
    }

    pub fn record_tournament_win(&mut self) {
        self.tournament_wins += 1;
    }

    pub fn record_consumed(&mut self, flags: &ConsumableFlags) {
        self.consumables_used += flags.count();
    }
}

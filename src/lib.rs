//! Battle arena: a recurring elimination tournament engine.
//!
//! Models and pure tournament logic, the gateways to the outside world, and the async engine
//! that drives sweeps on a timer.

pub mod config;
pub mod engine;
pub mod gateway;
pub mod logic;
pub mod models;

pub use config::{ArenaConfig, ConfigError, EntryRule};
pub use engine::{restore_tournament, Arena, ArenaError, Payout, PayoutCoordinator, TickOutcome};
pub use gateway::{
    CollectingSink, GatewayError, LedgerGateway, LogSink, MemoryLedger, MemoryStore,
    NotificationSink, SnapshotStore, TransactionReceipt,
};
pub use logic::{CombatOutcome, Combatant, Matchmaker, RandomSource, SweepVerdict};
pub use models::{
    Amount, ConsumableFlags, ContestantId, ContestantRecord, MatchRecord, MatchResult, OwnerId,
    PopulationRegistry, StatTable, StatTableError, StatVector, Tournament, TournamentError,
    TournamentSettings, TournamentState,
};

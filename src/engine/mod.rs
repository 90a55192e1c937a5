//! Orchestration: the timer-driven scheduler and the payout coordinator. This is the only
//! layer that talks to the gateways.

mod arena;
mod payout;

pub use arena::{restore_tournament, Arena, TickOutcome, SNAPSHOT_KEY};
pub use payout::{Payout, PayoutCoordinator};

use crate::gateway::GatewayError;
use crate::models::TournamentError;
use std::future::Future;
use std::time::Duration;

/// Errors surfaced by a tick.
#[derive(Debug)]
pub enum ArenaError {
    /// An engine invariant broke; the sweep was halted for investigation.
    Invariant(TournamentError),
    /// An external call failed; the step is retried on a later tick.
    Gateway(GatewayError),
    /// A snapshot or record could not be encoded or decoded.
    Snapshot(serde_json::Error),
}

impl std::fmt::Display for ArenaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArenaError::Invariant(e) => write!(f, "Invariant violated: {}", e),
            ArenaError::Gateway(e) => write!(f, "External call failed: {}", e),
            ArenaError::Snapshot(e) => write!(f, "Snapshot encoding failed: {}", e),
        }
    }
}

impl std::error::Error for ArenaError {}

impl From<TournamentError> for ArenaError {
    fn from(e: TournamentError) -> Self {
        ArenaError::Invariant(e)
    }
}

impl From<GatewayError> for ArenaError {
    fn from(e: GatewayError) -> Self {
        ArenaError::Gateway(e)
    }
}

impl From<serde_json::Error> for ArenaError {
    fn from(e: serde_json::Error) -> Self {
        ArenaError::Snapshot(e)
    }
}

/// Run an external call, turning an overrun of `limit` into [`GatewayError::Timeout`].
pub async fn with_timeout<T>(
    limit: Duration,
    operation: &'static str,
    call: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, GatewayError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout { operation }),
    }
}

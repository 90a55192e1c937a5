//! Narrow interfaces to everything outside the engine: the ledger, the snapshot store and the
//! notification sink, plus in-memory adapters.

mod memory;
mod sink;

pub use memory::{Disbursement, MemoryLedger, MemoryStore};
pub use sink::{CollectingSink, LogSink};

use crate::models::{Amount, ConsumableFlags, ContestantId, OwnerId};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Failure of an external call. Always recoverable: the step is retried on a later tick.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GatewayError {
    /// The call did not answer within the configured timeout.
    Timeout { operation: &'static str },
    /// The service could not be reached or answered with an error.
    Unavailable(String),
    /// The service refused the request (e.g. a reverted transaction).
    Rejected(String),
    /// A surviving contestant has no owner on the ledger.
    MissingOwner(ContestantId),
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::Timeout { operation } => write!(f, "{} timed out", operation),
            GatewayError::Unavailable(msg) => write!(f, "Service unavailable: {}", msg),
            GatewayError::Rejected(msg) => write!(f, "Request rejected: {}", msg),
            GatewayError::MissingOwner(id) => write!(f, "Contestant {} has no owner", id),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Confirmation of a reward disbursement.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
}

/// Ownership, balances and consumables on the ledger, plus reward transfers.
pub trait LedgerGateway: Send + Sync {
    /// Current owner, or `None` for ids that were never minted or were burned.
    fn owner_of(
        &self,
        id: ContestantId,
    ) -> impl Future<Output = Result<Option<OwnerId>, GatewayError>> + Send;

    /// Token balance of an owner, used by the holders-only entry rule.
    fn balance_of(&self, owner: &str) -> impl Future<Output = Result<Amount, GatewayError>> + Send;

    fn consumable_flags(
        &self,
        id: ContestantId,
    ) -> impl Future<Output = Result<ConsumableFlags, GatewayError>> + Send;

    /// Reward pool available for the current payout.
    fn pool_balance(&self) -> impl Future<Output = Result<Amount, GatewayError>> + Send;

    /// Pay `share` to every entry of `winners` (an owner appears once per surviving contestant).
    fn disburse(
        &self,
        winners: &[OwnerId],
        share: Amount,
        count: usize,
    ) -> impl Future<Output = Result<TransactionReceipt, GatewayError>> + Send;

    /// Clear all four flags of each id.
    fn consume_flags(
        &self,
        ids: &[ContestantId],
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Shared key-value store for snapshots and match records.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, GatewayError>> + Send;

    fn put(&self, key: &str, value: String) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Outbound announcements. Delivery failures never affect the engine.
pub trait NotificationSink: Send + Sync {
    fn send(&self, message: String) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

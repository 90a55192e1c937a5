//! Payout: split the pool between the survivors' owners and confirm the transfer.

use crate::engine::with_timeout;
use crate::gateway::{GatewayError, LedgerGateway, TransactionReceipt};
use crate::logic::compute_share;
use crate::models::{Amount, ContestantId, OwnerId};
use serde::Serialize;
use std::time::Duration;

/// A confirmed payout.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Payout {
    /// Owner of each survivor, in survivor order (an owner repeats per contestant held).
    pub winners: Vec<OwnerId>,
    pub share: Amount,
    pub pool: Amount,
    /// `None` when nobody survived and nothing was sent.
    pub receipt: Option<TransactionReceipt>,
}

pub struct PayoutCoordinator<'a, L> {
    ledger: &'a L,
    call_timeout: Duration,
}

impl<'a, L: LedgerGateway> PayoutCoordinator<'a, L> {
    pub fn new(ledger: &'a L, call_timeout: Duration) -> Self {
        Self {
            ledger,
            call_timeout,
        }
    }

    /// Pay the survivors. Returns only once the ledger confirmed the disbursement; any error
    /// means nothing was paid and the caller must keep the tournament where it is.
    pub async fn payout(&self, survivors: &[ContestantId]) -> Result<Payout, GatewayError> {
        let mut winners = Vec::with_capacity(survivors.len());
        for &id in survivors {
            let owner = with_timeout(self.call_timeout, "owner_of", self.ledger.owner_of(id))
                .await?
                .ok_or(GatewayError::MissingOwner(id))?;
            winners.push(owner);
        }

        let pool = with_timeout(self.call_timeout, "pool_balance", self.ledger.pool_balance()).await?;
        if winners.is_empty() {
            return Ok(Payout {
                winners,
                share: 0,
                pool,
                receipt: None,
            });
        }

        let share = compute_share(pool, survivors.len());
        let receipt = with_timeout(
            self.call_timeout,
            "disburse",
            self.ledger.disburse(&winners, share, survivors.len()),
        )
        .await?;
        log::info!(
            "Disbursed {} to each of {} winners (tx {})",
            share,
            winners.len(),
            receipt.tx_hash
        );

        Ok(Payout {
            winners,
            share,
            pool,
            receipt: Some(receipt),
        })
    }
}

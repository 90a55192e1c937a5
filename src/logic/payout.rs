//! Reward split between the survivors of a tournament.

use crate::models::Amount;

/// Share paid per surviving contestant.
///
/// Floor division in the ledger's smallest unit; the remainder stays in the pool and rolls
/// over into the next tournament. A zero survivor count is treated as one.
pub fn compute_share(pool: Amount, survivors: usize) -> Amount {
    let count = survivors.max(1) as Amount;
    pool / count
}

/// Part of the pool left undistributed by [`compute_share`].
pub fn remainder(pool: Amount, survivors: usize) -> Amount {
    let count = survivors.max(1) as Amount;
    pool % count
}

//! In-memory ledger and key-value store. Used by the standalone binary and by tests.

use crate::gateway::{GatewayError, LedgerGateway, SnapshotStore, TransactionReceipt};
use crate::models::{Amount, ConsumableFlags, ContestantId, OwnerId};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// One confirmed payout, kept for inspection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Disbursement {
    pub winners: Vec<OwnerId>,
    pub share: Amount,
    pub count: usize,
    pub receipt: TransactionReceipt,
}

#[derive(Debug, Default)]
struct LedgerBook {
    owners: HashMap<ContestantId, OwnerId>,
    balances: HashMap<OwnerId, Amount>,
    flags: HashMap<ContestantId, ConsumableFlags>,
    pool: Amount,
    disbursements: Vec<Disbursement>,
}

/// Ledger kept in process memory.
///
/// Failure switches and an artificial latency let callers exercise the engine's
/// deferral and timeout paths.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    book: Mutex<LedgerBook>,
    offline: AtomicBool,
    reject_disburse: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

fn lock_error() -> GatewayError {
    GatewayError::Unavailable("ledger lock error".to_string())
}

impl MemoryLedger {
    pub fn new(pool: Amount) -> Self {
        let ledger = Self::default();
        if let Ok(mut book) = ledger.book.lock() {
            book.pool = pool;
        }
        ledger
    }

    /// Ledger seeded from a headerless `id,owner` CSV file.
    pub fn load_owners(path: impl AsRef<Path>, pool: Amount) -> Result<Self, csv::Error> {
        let file = std::fs::File::open(path).map_err(csv::Error::from)?;
        Self::owners_from_reader(file, pool)
    }

    pub fn owners_from_reader(reader: impl Read, pool: Amount) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let ledger = Self::new(pool);
        for row in csv_reader.deserialize::<(ContestantId, OwnerId)>() {
            let (id, owner) = row?;
            ledger.set_owner(id, owner);
        }
        Ok(ledger)
    }

    pub fn set_owner(&self, id: ContestantId, owner: impl Into<OwnerId>) {
        if let Ok(mut book) = self.book.lock() {
            book.owners.insert(id, owner.into());
        }
    }

    pub fn set_balance(&self, owner: impl Into<OwnerId>, amount: Amount) {
        if let Ok(mut book) = self.book.lock() {
            book.balances.insert(owner.into(), amount);
        }
    }

    pub fn set_flags(&self, id: ContestantId, flags: ConsumableFlags) {
        if let Ok(mut book) = self.book.lock() {
            book.flags.insert(id, flags);
        }
    }

    pub fn flags(&self, id: ContestantId) -> ConsumableFlags {
        self.book
            .lock()
            .ok()
            .and_then(|book| book.flags.get(&id).copied())
            .unwrap_or_default()
    }

    pub fn set_pool(&self, amount: Amount) {
        if let Ok(mut book) = self.book.lock() {
            book.pool = amount;
        }
    }

    pub fn pool(&self) -> Amount {
        self.book.lock().map(|book| book.pool).unwrap_or_default()
    }

    pub fn disbursements(&self) -> Vec<Disbursement> {
        self.book
            .lock()
            .map(|book| book.disbursements.clone())
            .unwrap_or_default()
    }

    /// Every call fails with `Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// `disburse` fails with `Rejected` while set.
    pub fn set_reject_disburse(&self, reject: bool) {
        self.reject_disburse.store(reject, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut l) = self.latency.lock() {
            *l = latency;
        }
    }

    async fn call(&self) -> Result<(), GatewayError> {
        let latency = *self.latency.lock().map_err(|_| lock_error())?;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("ledger offline".to_string()));
        }
        Ok(())
    }
}

impl LedgerGateway for MemoryLedger {
    async fn owner_of(&self, id: ContestantId) -> Result<Option<OwnerId>, GatewayError> {
        self.call().await?;
        let book = self.book.lock().map_err(|_| lock_error())?;
        Ok(book.owners.get(&id).cloned())
    }

    async fn balance_of(&self, owner: &str) -> Result<Amount, GatewayError> {
        self.call().await?;
        let book = self.book.lock().map_err(|_| lock_error())?;
        Ok(book.balances.get(owner).copied().unwrap_or(0))
    }

    async fn consumable_flags(&self, id: ContestantId) -> Result<ConsumableFlags, GatewayError> {
        self.call().await?;
        let book = self.book.lock().map_err(|_| lock_error())?;
        Ok(book.flags.get(&id).copied().unwrap_or_default())
    }

    async fn pool_balance(&self) -> Result<Amount, GatewayError> {
        self.call().await?;
        let book = self.book.lock().map_err(|_| lock_error())?;
        Ok(book.pool)
    }

    async fn disburse(
        &self,
        winners: &[OwnerId],
        share: Amount,
        count: usize,
    ) -> Result<TransactionReceipt, GatewayError> {
        self.call().await?;
        if self.reject_disburse.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("disbursement reverted".to_string()));
        }
        let mut book = self.book.lock().map_err(|_| lock_error())?;
        let total = share * winners.len() as Amount;
        if total > book.pool {
            return Err(GatewayError::Rejected(format!(
                "pool holds {}, payout needs {}",
                book.pool, total
            )));
        }
        book.pool -= total;
        for owner in winners {
            *book.balances.entry(owner.clone()).or_insert(0) += share;
        }
        let receipt = TransactionReceipt {
            tx_hash: format!("0x{}", Uuid::new_v4().simple()),
        };
        book.disbursements.push(Disbursement {
            winners: winners.to_vec(),
            share,
            count,
            receipt: receipt.clone(),
        });
        Ok(receipt)
    }

    async fn consume_flags(&self, ids: &[ContestantId]) -> Result<(), GatewayError> {
        self.call().await?;
        let mut book = self.book.lock().map_err(|_| lock_error())?;
        for id in ids {
            book.flags.remove(id);
        }
        Ok(())
    }
}

/// Key-value store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| GatewayError::Unavailable("store lock error".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), GatewayError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GatewayError::Unavailable("store lock error".to_string()))?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| GatewayError::Unavailable("store lock error".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

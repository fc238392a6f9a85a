//! Durable side of a confirmation.
//!
//! When an election confirms, the winner's account chain is cemented up to
//! the winner's height. The write happens in one store write transaction,
//! outside every election and registry lock.

use lattice_store::{ConfirmationHeightInfo, ConfirmationHeightStore, ConfirmationHeightWrite, ReadTxn, Store};
use lattice_types::{Account, BlockHash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::ConsensusError;

/// Ledger counters kept in memory so they can be read without a transaction.
#[derive(Debug, Default)]
pub struct LedgerCache {
    cemented_count: AtomicU64,
}

impl LedgerCache {
    pub fn new(cemented_count: u64) -> Self {
        Self {
            cemented_count: AtomicU64::new(cemented_count),
        }
    }

    /// Seed the counters from the confirmation height table.
    pub fn load(txn: &dyn ReadTxn) -> Result<Self, ConsensusError> {
        let cemented = txn
            .confirmation_heights()?
            .iter()
            .map(|(_, info)| info.height)
            .sum();
        Ok(Self::new(cemented))
    }

    /// Number of blocks below or at a confirmation height.
    pub fn cemented_count(&self) -> u64 {
        self.cemented_count.load(Ordering::Relaxed)
    }

    fn add_cemented(&self, count: u64) {
        self.cemented_count.fetch_add(count, Ordering::Relaxed);
    }
}

/// Writes confirmation heights for confirmed winners.
pub struct ConfirmationWriter {
    store: Arc<dyn Store>,
    ledger_cache: Arc<LedgerCache>,
}

impl ConfirmationWriter {
    pub fn new(store: Arc<dyn Store>, ledger_cache: Arc<LedgerCache>) -> Self {
        Self {
            store,
            ledger_cache,
        }
    }

    pub fn ledger_cache(&self) -> &Arc<LedgerCache> {
        &self.ledger_cache
    }

    /// Raise `account`'s confirmation height to `height` with `hash` as the
    /// new frontier.
    ///
    /// Heights only move forward. Returns `false` without writing when the
    /// account is already confirmed at or above `height`.
    pub fn write_confirmation(
        &self,
        account: &Account,
        height: u64,
        hash: &BlockHash,
    ) -> Result<bool, ConsensusError> {
        let mut txn = self.store.tx_begin_write()?;
        let current = txn.confirmation_height(account)?.unwrap_or_default();
        if current.height >= height {
            trace!(account = %account, height, current = current.height, "confirmation height unchanged");
            return Ok(false);
        }
        txn.put_confirmation_height(account, &ConfirmationHeightInfo::new(height, *hash))?;
        txn.commit()?;

        self.ledger_cache.add_cemented(height - current.height);
        debug!(account = %account, height, frontier = %hash, "confirmation height written");
        Ok(true)
    }

    pub fn confirmation_height(&self, account: &Account) -> Result<Option<ConfirmationHeightInfo>, ConsensusError> {
        let txn = self.store.tx_begin_read()?;
        Ok(txn.confirmation_height(account)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_nullables::MemoryStore;

    fn make_account(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn make_hash(byte: u8) -> BlockHash {
        BlockHash::new([byte; 32])
    }

    fn writer() -> ConfirmationWriter {
        ConfirmationWriter::new(Arc::new(MemoryStore::new()), Arc::new(LedgerCache::default()))
    }

    #[test]
    fn writes_height_and_frontier() {
        let writer = writer();
        assert!(writer.write_confirmation(&make_account(1), 3, &make_hash(3)).unwrap());
        assert_eq!(
            writer.confirmation_height(&make_account(1)).unwrap(),
            Some(ConfirmationHeightInfo::new(3, make_hash(3)))
        );
        assert_eq!(writer.ledger_cache().cemented_count(), 3);
    }

    #[test]
    fn height_never_moves_back() {
        let writer = writer();
        writer.write_confirmation(&make_account(1), 5, &make_hash(5)).unwrap();
        assert!(!writer.write_confirmation(&make_account(1), 4, &make_hash(4)).unwrap());
        assert!(!writer.write_confirmation(&make_account(1), 5, &make_hash(6)).unwrap());
        assert_eq!(
            writer.confirmation_height(&make_account(1)).unwrap(),
            Some(ConfirmationHeightInfo::new(5, make_hash(5)))
        );
        assert_eq!(writer.ledger_cache().cemented_count(), 5);
    }

    #[test]
    fn cemented_count_tracks_increments() {
        let writer = writer();
        writer.write_confirmation(&make_account(1), 2, &make_hash(2)).unwrap();
        writer.write_confirmation(&make_account(1), 7, &make_hash(7)).unwrap();
        writer.write_confirmation(&make_account(2), 1, &make_hash(9)).unwrap();
        assert_eq!(writer.ledger_cache().cemented_count(), 8);
    }

    #[test]
    fn ledger_cache_loads_from_store() {
        let store = Arc::new(MemoryStore::new());
        let writer = ConfirmationWriter::new(store.clone(), Arc::new(LedgerCache::default()));
        writer.write_confirmation(&make_account(1), 4, &make_hash(4)).unwrap();
        writer.write_confirmation(&make_account(2), 2, &make_hash(2)).unwrap();

        let txn = store.tx_begin_read().unwrap();
        let cache = LedgerCache::load(txn.as_ref()).unwrap();
        assert_eq!(cache.cemented_count(), 6);
    }
}

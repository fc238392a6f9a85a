//! In-memory transactional store.
//!
//! Readers see an immutable snapshot taken when their transaction began.
//! Writers are serialized by a mutex and publish a new snapshot on commit.

use lattice_store::{ReadTxn, Store, StoreError, Table, WriteTxn};
use lattice_utils::{MutexExt, RwLockExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

type Tables = HashMap<Table, BTreeMap<Vec<u8>, Vec<u8>>>;

#[derive(Default)]
pub struct MemoryStore {
    committed: RwLock<Arc<Tables>>,
    writer: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<Tables> {
        Arc::clone(&self.committed.read_locked())
    }
}

impl Store for MemoryStore {
    fn tx_begin_read(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError> {
        Ok(Box::new(MemoryReadTxn {
            snapshot: self.snapshot(),
        }))
    }

    fn tx_begin_write(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError> {
        let guard = self.writer.locked();
        Ok(Box::new(MemoryWriteTxn {
            store: self,
            base: self.snapshot(),
            pending: BTreeMap::new(),
            _guard: guard,
        }))
    }
}

fn snapshot_iter(tables: &Tables, table: Table) -> impl Iterator<Item = (&Vec<u8>, &Vec<u8>)> {
    tables.get(&table).into_iter().flat_map(|t| t.iter())
}

struct MemoryReadTxn {
    snapshot: Arc<Tables>,
}

impl ReadTxn for MemoryReadTxn {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .snapshot
            .get(&table)
            .and_then(|t| t.get(key))
            .cloned())
    }

    fn iter(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(snapshot_iter(&self.snapshot, table)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

struct MemoryWriteTxn<'a> {
    store: &'a MemoryStore,
    base: Arc<Tables>,
    /// `None` marks a deletion.
    pending: BTreeMap<(Table, Vec<u8>), Option<Vec<u8>>>,
    _guard: MutexGuard<'a, ()>,
}

impl ReadTxn for MemoryWriteTxn<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(change) = self.pending.get(&(table, key.to_vec())) {
            return Ok(change.clone());
        }
        Ok(self.base.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn iter(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = snapshot_iter(&self.base, table)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for ((t, key), change) in &self.pending {
            if *t != table {
                continue;
            }
            match change {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }
}

impl WriteTxn for MemoryWriteTxn<'_> {
    fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.pending
            .insert((table, key.to_vec()), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &[u8]) -> Result<bool, StoreError> {
        let existed = self.get(table, key)?.is_some();
        self.pending.insert((table, key.to_vec()), None);
        Ok(existed)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryWriteTxn {
            store,
            base,
            pending,
            _guard,
        } = *self;
        let mut tables: Tables = (*base).clone();
        for ((table, key), change) in pending {
            let t = tables.entry(table).or_default();
            match change {
                Some(value) => {
                    t.insert(key, value);
                }
                None => {
                    t.remove(&key);
                }
            }
        }
        *store.committed.write_locked() = Arc::new(tables);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_store::{
        ConfirmationHeightInfo, ConfirmationHeightStore, ConfirmationHeightWrite,
        OnlineWeightStore, OnlineWeightWrite, RepWeightStore, RepWeightWrite,
    };
    use lattice_types::{Account, Amount, BlockHash, Timestamp};

    #[test]
    fn committed_writes_are_visible() {
        let store = MemoryStore::new();
        let rep = Account::new([1; 32]);
        let mut txn = store.tx_begin_write().unwrap();
        txn.put_rep_weight(&rep, Amount::raw(10)).unwrap();
        txn.commit().unwrap();
        assert_eq!(
            store.tx_begin_read().unwrap().rep_weight(&rep).unwrap(),
            Some(Amount::raw(10))
        );
    }

    #[test]
    fn dropped_write_txn_is_rolled_back() {
        let store = MemoryStore::new();
        let rep = Account::new([1; 32]);
        {
            let mut txn = store.tx_begin_write().unwrap();
            txn.put_rep_weight(&rep, Amount::raw(10)).unwrap();
        }
        assert_eq!(store.tx_begin_read().unwrap().rep_weight(&rep).unwrap(), None);
    }

    #[test]
    fn reader_keeps_its_snapshot() {
        let store = MemoryStore::new();
        let account = Account::new([2; 32]);
        let reader = store.tx_begin_read().unwrap();

        let mut txn = store.tx_begin_write().unwrap();
        txn.put_confirmation_height(&account, &ConfirmationHeightInfo::new(1, BlockHash::new([1; 32])))
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(reader.confirmation_height(&account).unwrap(), None);
        assert!(store
            .tx_begin_read()
            .unwrap()
            .confirmation_height(&account)
            .unwrap()
            .is_some());
    }

    #[test]
    fn write_txn_iter_merges_pending_changes() {
        let store = MemoryStore::new();
        let mut txn = store.tx_begin_write().unwrap();
        txn.put_online_weight(Timestamp::new(1), Amount::raw(1)).unwrap();
        txn.put_online_weight(Timestamp::new(2), Amount::raw(2)).unwrap();
        txn.commit().unwrap();

        let mut txn = store.tx_begin_write().unwrap();
        assert!(txn.delete_online_weight(Timestamp::new(1)).unwrap());
        txn.put_online_weight(Timestamp::new(3), Amount::raw(3)).unwrap();
        let samples = txn.online_weight_samples().unwrap();
        assert_eq!(
            samples,
            vec![
                (Timestamp::new(2), Amount::raw(2)),
                (Timestamp::new(3), Amount::raw(3))
            ]
        );
        assert_eq!(txn.online_weight_count().unwrap(), 2);
    }

    #[test]
    fn writers_are_serialized() {
        let store = Arc::new(MemoryStore::new());
        let rep = Account::new([3; 32]);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut txn = store.tx_begin_write().unwrap();
                    let current = txn.rep_weight(&rep).unwrap().unwrap_or_default();
                    txn.put_rep_weight(&rep, current + Amount::raw(1)).unwrap();
                    txn.commit().unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(
            store.tx_begin_read().unwrap().rep_weight(&rep).unwrap(),
            Some(Amount::raw(8))
        );
    }
}

//! Read and write transactions over the LMDB databases.

use heed::{RoTxn, RwTxn};
use lattice_store::{ReadTxn, StoreError, Table, WriteTxn};

use crate::environment::Databases;
use crate::LmdbError;

fn collect(
    txn: &RoTxn<'_>,
    dbs: &Databases,
    table: Table,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
    let iter = dbs.get(table).iter(txn).map_err(LmdbError::from)?;
    let mut entries = Vec::new();
    for entry in iter {
        let (key, value) = entry.map_err(LmdbError::from)?;
        entries.push((key.to_vec(), value.to_vec()));
    }
    Ok(entries)
}

pub struct LmdbReadTxn<'env> {
    txn: RoTxn<'env>,
    dbs: Databases,
}

impl<'env> LmdbReadTxn<'env> {
    pub(crate) fn new(txn: RoTxn<'env>, dbs: Databases) -> Self {
        Self { txn, dbs }
    }
}

impl ReadTxn for LmdbReadTxn<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .dbs
            .get(table)
            .get(&self.txn, key)
            .map_err(LmdbError::from)?;
        Ok(value.map(<[u8]>::to_vec))
    }

    fn iter(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        collect(&self.txn, &self.dbs, table)
    }

    fn count(&self, table: Table) -> Result<u64, StoreError> {
        Ok(self.dbs.get(table).len(&self.txn).map_err(LmdbError::from)?)
    }
}

/// Holds the single LMDB writer lock until committed or dropped.
pub struct LmdbWriteTxn<'env> {
    txn: RwTxn<'env>,
    dbs: Databases,
}

impl<'env> LmdbWriteTxn<'env> {
    pub(crate) fn new(txn: RwTxn<'env>, dbs: Databases) -> Self {
        Self { txn, dbs }
    }
}

impl ReadTxn for LmdbWriteTxn<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self
            .dbs
            .get(table)
            .get(&self.txn, key)
            .map_err(LmdbError::from)?;
        Ok(value.map(<[u8]>::to_vec))
    }

    fn iter(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        collect(&self.txn, &self.dbs, table)
    }

    fn count(&self, table: Table) -> Result<u64, StoreError> {
        Ok(self.dbs.get(table).len(&self.txn).map_err(LmdbError::from)?)
    }
}

impl WriteTxn for LmdbWriteTxn<'_> {
    fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.dbs
            .get(table)
            .put(&mut self.txn, key, value)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self
            .dbs
            .get(table)
            .delete(&mut self.txn, key)
            .map_err(LmdbError::from)?)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

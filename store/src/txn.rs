//! Transactions and the store that opens them.

use crate::StoreError;

/// Logical tables. Each backend maps a table to one named database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    ConfirmationHeight,
    OnlineWeight,
    RepWeights,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::ConfirmationHeight, Table::OnlineWeight, Table::RepWeights];

    pub fn name(&self) -> &'static str {
        match self {
            Table::ConfirmationHeight => "confirmation_height",
            Table::OnlineWeight => "online_weight",
            Table::RepWeights => "rep_weights",
        }
    }
}

/// A consistent read view of the store.
pub trait ReadTxn {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// All entries of `table` in ascending key order.
    fn iter(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    fn count(&self, table: Table) -> Result<u64, StoreError> {
        Ok(self.iter(table)?.len() as u64)
    }
}

/// A write transaction. Changes become visible to other transactions only
/// after [`WriteTxn::commit`]; dropping without commit discards them.
///
/// Backends allow at most one open write transaction at a time.
pub trait WriteTxn: ReadTxn {
    fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Returns whether the key existed.
    fn delete(&mut self, table: Table, key: &[u8]) -> Result<bool, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// A transactional key-value store.
pub trait Store: Send + Sync {
    fn tx_begin_read(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError>;

    /// Blocks until any other write transaction has finished.
    fn tx_begin_write(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError>;
}

/// Decode a fixed-width value, reporting the table on a length mismatch.
pub(crate) fn fixed<const N: usize>(table: Table, bytes: &[u8]) -> Result<[u8; N], StoreError> {
    bytes.try_into().map_err(|_| {
        StoreError::Corruption(format!(
            "{}: expected {} bytes, got {}",
            table.name(),
            N,
            bytes.len()
        ))
    })
}

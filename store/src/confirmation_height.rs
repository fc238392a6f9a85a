//! Confirmation height table: account → (height, frontier).

use lattice_types::{Account, BlockHash};
use serde::{Deserialize, Serialize};

use crate::txn::fixed;
use crate::{ReadTxn, StoreError, Table, WriteTxn};

/// Highest confirmed position of an account chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationHeightInfo {
    pub height: u64,
    pub frontier: BlockHash,
}

impl ConfirmationHeightInfo {
    pub fn new(height: u64, frontier: BlockHash) -> Self {
        Self { height, frontier }
    }
}

pub trait ConfirmationHeightStore {
    fn confirmation_height(
        &self,
        account: &Account,
    ) -> Result<Option<ConfirmationHeightInfo>, StoreError>;

    /// All recorded confirmation heights, ordered by account.
    fn confirmation_heights(&self) -> Result<Vec<(Account, ConfirmationHeightInfo)>, StoreError>;
}

impl<T: ReadTxn + ?Sized> ConfirmationHeightStore for T {
    fn confirmation_height(
        &self,
        account: &Account,
    ) -> Result<Option<ConfirmationHeightInfo>, StoreError> {
        self.get(Table::ConfirmationHeight, account.as_bytes())?
            .map(|bytes| bincode::deserialize(&bytes).map_err(StoreError::from))
            .transpose()
    }

    fn confirmation_heights(&self) -> Result<Vec<(Account, ConfirmationHeightInfo)>, StoreError> {
        self.iter(Table::ConfirmationHeight)?
            .into_iter()
            .map(|(key, value)| {
                let account = Account::new(fixed::<32>(Table::ConfirmationHeight, &key)?);
                Ok((account, bincode::deserialize(&value)?))
            })
            .collect()
    }
}

pub trait ConfirmationHeightWrite {
    fn put_confirmation_height(
        &mut self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError>;

    fn delete_confirmation_height(&mut self, account: &Account) -> Result<bool, StoreError>;
}

impl<T: WriteTxn + ?Sized> ConfirmationHeightWrite for T {
    fn put_confirmation_height(
        &mut self,
        account: &Account,
        info: &ConfirmationHeightInfo,
    ) -> Result<(), StoreError> {
        let value = bincode::serialize(info)?;
        self.put(Table::ConfirmationHeight, account.as_bytes(), &value)
    }

    fn delete_confirmation_height(&mut self, account: &Account) -> Result<bool, StoreError> {
        self.delete(Table::ConfirmationHeight, account.as_bytes())
    }
}

//! Representative weight table: representative account → weight.

use lattice_types::{Account, Amount};

use crate::txn::fixed;
use crate::{ReadTxn, StoreError, Table, WriteTxn};

pub trait RepWeightStore {
    fn rep_weight(&self, rep: &Account) -> Result<Option<Amount>, StoreError>;

    fn rep_weights(&self) -> Result<Vec<(Account, Amount)>, StoreError>;
}

impl<T: ReadTxn + ?Sized> RepWeightStore for T {
    fn rep_weight(&self, rep: &Account) -> Result<Option<Amount>, StoreError> {
        self.get(Table::RepWeights, rep.as_bytes())?
            .map(|bytes| fixed::<16>(Table::RepWeights, &bytes).map(Amount::from_be_bytes))
            .transpose()
    }

    fn rep_weights(&self) -> Result<Vec<(Account, Amount)>, StoreError> {
        self.iter(Table::RepWeights)?
            .into_iter()
            .map(|(key, value)| {
                let rep = Account::new(fixed::<32>(Table::RepWeights, &key)?);
                let weight = Amount::from_be_bytes(fixed::<16>(Table::RepWeights, &value)?);
                Ok((rep, weight))
            })
            .collect()
    }
}

pub trait RepWeightWrite {
    fn put_rep_weight(&mut self, rep: &Account, weight: Amount) -> Result<(), StoreError>;

    fn delete_rep_weight(&mut self, rep: &Account) -> Result<bool, StoreError>;
}

impl<T: WriteTxn + ?Sized> RepWeightWrite for T {
    fn put_rep_weight(&mut self, rep: &Account, weight: Amount) -> Result<(), StoreError> {
        self.put(Table::RepWeights, rep.as_bytes(), &weight.to_be_bytes())
    }

    fn delete_rep_weight(&mut self, rep: &Account) -> Result<bool, StoreError> {
        self.delete(Table::RepWeights, rep.as_bytes())
    }
}

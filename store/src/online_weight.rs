//! Online weight samples: timestamp (seconds, big-endian) → online stake.

use lattice_types::{Amount, Timestamp};

use crate::txn::fixed;
use crate::{ReadTxn, StoreError, Table, WriteTxn};

pub trait OnlineWeightStore {
    /// All samples, oldest first.
    fn online_weight_samples(&self) -> Result<Vec<(Timestamp, Amount)>, StoreError>;

    fn online_weight_count(&self) -> Result<u64, StoreError>;
}

impl<T: ReadTxn + ?Sized> OnlineWeightStore for T {
    fn online_weight_samples(&self) -> Result<Vec<(Timestamp, Amount)>, StoreError> {
        self.iter(Table::OnlineWeight)?
            .into_iter()
            .map(|(key, value)| {
                let ts = u64::from_be_bytes(fixed::<8>(Table::OnlineWeight, &key)?);
                let weight = Amount::from_be_bytes(fixed::<16>(Table::OnlineWeight, &value)?);
                Ok((Timestamp::new(ts), weight))
            })
            .collect()
    }

    fn online_weight_count(&self) -> Result<u64, StoreError> {
        self.count(Table::OnlineWeight)
    }
}

pub trait OnlineWeightWrite {
    fn put_online_weight(&mut self, time: Timestamp, weight: Amount) -> Result<(), StoreError>;

    fn delete_online_weight(&mut self, time: Timestamp) -> Result<bool, StoreError>;
}

impl<T: WriteTxn + ?Sized> OnlineWeightWrite for T {
    fn put_online_weight(&mut self, time: Timestamp, weight: Amount) -> Result<(), StoreError> {
        self.put(
            Table::OnlineWeight,
            &time.as_secs().to_be_bytes(),
            &weight.to_be_bytes(),
        )
    }

    fn delete_online_weight(&mut self, time: Timestamp) -> Result<bool, StoreError> {
        self.delete(Table::OnlineWeight, &time.as_secs().to_be_bytes())
    }
}

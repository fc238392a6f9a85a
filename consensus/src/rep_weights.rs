//! Representative weights, kept in memory and mirrored to the store.
//!
//! Every block that moves balance into or out of a representative's control
//! changes that representative's weight. The ledger applies the change inside
//! the same write transaction as the block itself, and a rollback applies the
//! inverse change, so the table always matches the ledger.

use lattice_store::{ReadTxn, RepWeightStore, RepWeightWrite, WriteTxn};
use lattice_types::{Account, Amount};
use lattice_utils::RwLockExt;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::trace;

use crate::ConsensusError;

/// A signed change to a representative's weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightChange {
    Credit(Amount),
    Debit(Amount),
}

impl WeightChange {
    /// The change that undoes this one.
    pub fn inverse(self) -> Self {
        match self {
            WeightChange::Credit(a) => WeightChange::Debit(a),
            WeightChange::Debit(a) => WeightChange::Credit(a),
        }
    }

    fn apply(self, rep: &Account, current: Amount) -> Result<Amount, ConsensusError> {
        match self {
            WeightChange::Credit(credit) => {
                current
                    .checked_add(credit)
                    .ok_or(ConsensusError::WeightOverflow {
                        rep: *rep,
                        current,
                        credit,
                    })
            }
            WeightChange::Debit(debit) => {
                current
                    .checked_sub(debit)
                    .ok_or(ConsensusError::WeightUnderflow {
                        rep: *rep,
                        current,
                        debit,
                    })
            }
        }
    }
}

/// Representative → weight. Reads never touch the store.
#[derive(Default)]
pub struct RepWeights {
    weights: RwLock<HashMap<Account, Amount>>,
}

impl RepWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the in-memory table from the persisted one. Called once at startup.
    pub fn load(txn: &dyn ReadTxn) -> Result<Self, ConsensusError> {
        let weights: HashMap<_, _> = txn.rep_weights()?.into_iter().collect();
        Ok(Self {
            weights: RwLock::new(weights),
        })
    }

    /// Apply `change` to `rep` in `txn` and in memory.
    ///
    /// The in-memory table is updated immediately; callers commit `txn`
    /// before anything else observes the ledger change.
    pub fn representation_add(
        &self,
        txn: &mut dyn WriteTxn,
        rep: &Account,
        change: WeightChange,
    ) -> Result<Amount, ConsensusError> {
        let mut weights = self.weights.write_locked();
        let current = weights.get(rep).copied().unwrap_or_default();
        let updated = change.apply(rep, current)?;

        if updated.is_zero() {
            txn.delete_rep_weight(rep)?;
            weights.remove(rep);
        } else {
            txn.put_rep_weight(rep, updated)?;
            weights.insert(*rep, updated);
        }
        trace!(rep = %rep, ?change, weight = %updated, "representation changed");
        Ok(updated)
    }

    /// Move `amount` of weight from one representative to another, as a
    /// change-of-representative block does.
    pub fn move_weight(
        &self,
        txn: &mut dyn WriteTxn,
        from: &Account,
        to: &Account,
        amount: Amount,
    ) -> Result<(), ConsensusError> {
        if from == to || amount.is_zero() {
            return Ok(());
        }
        self.representation_add(txn, from, WeightChange::Debit(amount))?;
        self.representation_add(txn, to, WeightChange::Credit(amount))?;
        Ok(())
    }

    /// Weight of `rep`; zero for unknown representatives.
    pub fn representation_get(&self, rep: &Account) -> Amount {
        self.weights
            .read_locked()
            .get(rep)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_weight(&self) -> Amount {
        self.weights.read_locked().values().sum()
    }

    /// Number of representatives with non-zero weight.
    pub fn len(&self) -> usize {
        self.weights.read_locked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every representative and its weight.
    pub fn snapshot(&self) -> HashMap<Account, Amount> {
        self.weights.read_locked().clone()
    }

    /// Seed weights without a store, for tests and tooling.
    pub fn from_weights(weights: impl IntoIterator<Item = (Account, Amount)>) -> Self {
        Self {
            weights: RwLock::new(
                weights
                    .into_iter()
                    .filter(|(_, w)| !w.is_zero())
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_nullables::MemoryStore;
    use lattice_store::Store;

    fn rep(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    #[test]
    fn unknown_rep_has_zero_weight() {
        let weights = RepWeights::new();
        assert_eq!(weights.representation_get(&rep(1)), Amount::ZERO);
        assert!(weights.is_empty());
    }

    #[test]
    fn credit_then_debit() {
        let store = MemoryStore::new();
        let weights = RepWeights::new();
        let mut txn = store.tx_begin_write().unwrap();
        weights
            .representation_add(txn.as_mut(), &rep(1), WeightChange::Credit(Amount::raw(100)))
            .unwrap();
        weights
            .representation_add(txn.as_mut(), &rep(1), WeightChange::Debit(Amount::raw(30)))
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(weights.representation_get(&rep(1)), Amount::raw(70));
        assert_eq!(
            store.tx_begin_read().unwrap().rep_weight(&rep(1)).unwrap(),
            Some(Amount::raw(70))
        );
    }

    #[test]
    fn inverse_change_restores_state() {
        let store = MemoryStore::new();
        let weights = RepWeights::from_weights([(rep(1), Amount::raw(50))]);
        let change = WeightChange::Credit(Amount::raw(25));

        let mut txn = store.tx_begin_write().unwrap();
        weights.representation_add(txn.as_mut(), &rep(1), change).unwrap();
        weights
            .representation_add(txn.as_mut(), &rep(1), change.inverse())
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(weights.representation_get(&rep(1)), Amount::raw(50));
    }

    #[test]
    fn zero_weight_is_removed() {
        let store = MemoryStore::new();
        let weights = RepWeights::new();
        let mut txn = store.tx_begin_write().unwrap();
        weights
            .representation_add(txn.as_mut(), &rep(2), WeightChange::Credit(Amount::raw(5)))
            .unwrap();
        weights
            .representation_add(txn.as_mut(), &rep(2), WeightChange::Debit(Amount::raw(5)))
            .unwrap();
        txn.commit().unwrap();

        assert!(weights.is_empty());
        assert!(store.tx_begin_read().unwrap().rep_weights().unwrap().is_empty());
    }

    #[test]
    fn debit_below_zero_is_rejected() {
        let store = MemoryStore::new();
        let weights = RepWeights::from_weights([(rep(1), Amount::raw(10))]);
        let mut txn = store.tx_begin_write().unwrap();
        let err = weights
            .representation_add(txn.as_mut(), &rep(1), WeightChange::Debit(Amount::raw(11)))
            .unwrap_err();
        assert!(matches!(err, ConsensusError::WeightUnderflow { .. }));
        assert_eq!(weights.representation_get(&rep(1)), Amount::raw(10));
    }

    #[test]
    fn move_weight_between_reps() {
        let store = MemoryStore::new();
        let weights = RepWeights::from_weights([(rep(1), Amount::raw(10))]);
        let mut txn = store.tx_begin_write().unwrap();
        weights
            .move_weight(txn.as_mut(), &rep(1), &rep(2), Amount::raw(4))
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(weights.representation_get(&rep(1)), Amount::raw(6));
        assert_eq!(weights.representation_get(&rep(2)), Amount::raw(4));
        assert_eq!(weights.total_weight(), Amount::raw(10));
    }

    #[test]
    fn load_from_store() {
        let store = MemoryStore::new();
        {
            let staging = RepWeights::new();
            let mut txn = store.tx_begin_write().unwrap();
            staging
                .representation_add(txn.as_mut(), &rep(7), WeightChange::Credit(Amount::raw(9)))
                .unwrap();
            txn.commit().unwrap();
        }
        let txn = store.tx_begin_read().unwrap();
        let weights = RepWeights::load(txn.as_ref()).unwrap();
        assert_eq!(weights.representation_get(&rep(7)), Amount::raw(9));
    }
}

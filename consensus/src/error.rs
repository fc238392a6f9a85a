use lattice_store::StoreError;
use lattice_types::{Account, Amount};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("weight of representative {rep} would drop below zero: {current} - {debit}")]
    WeightUnderflow {
        rep: Account,
        current: Amount,
        debit: Amount,
    },

    #[error("weight of representative {rep} would overflow: {current} + {credit}")]
    WeightOverflow {
        rep: Account,
        current: Amount,
        credit: Amount,
    },
}

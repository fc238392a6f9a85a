//! Abstract storage interface for the lattice election core.
//!
//! The core only needs a transactional key-value store: put, get, delete and
//! ordered iteration inside a read or write transaction. Backends (LMDB, the
//! in-memory nullable) implement [`Store`]; the typed tables in this crate are
//! extension traits over any transaction, so the rest of the codebase never
//! sees raw bytes.

pub mod confirmation_height;
pub mod error;
pub mod online_weight;
pub mod rep_weights;
pub mod txn;

pub use confirmation_height::{ConfirmationHeightInfo, ConfirmationHeightStore, ConfirmationHeightWrite};
pub use error::StoreError;
pub use online_weight::{OnlineWeightStore, OnlineWeightWrite};
pub use rep_weights::{RepWeightStore, RepWeightWrite};
pub use txn::{ReadTxn, Store, Table, WriteTxn};

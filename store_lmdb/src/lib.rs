//! LMDB storage backend for lattice.
//!
//! Implements the `lattice-store` transactional interface with the `heed`
//! LMDB bindings. Every logical table maps to one named database within a
//! single environment.

pub mod environment;
pub mod error;
pub mod transaction;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use transaction::{LmdbReadTxn, LmdbWriteTxn};

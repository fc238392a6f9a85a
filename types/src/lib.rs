//! Fundamental types for the lattice election core.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! accounts, hashes, roots, amounts, timestamps, blocks and votes.

pub mod account;
pub mod amount;
pub mod block;
pub mod error;
pub mod hash;
pub mod keys;
pub mod network;
pub mod time;
pub mod vote;

pub use account::Account;
pub use amount::Amount;
pub use block::{Block, BlockBuilder};
pub use error::TypesError;
pub use hash::{BlockHash, QualifiedRoot, Root};
pub use keys::{KeyPair, PrivateKey, Signature};
pub use network::Network;
pub use time::Timestamp;
pub use vote::Vote;

/// Blake2b with a 256-bit digest, the hash used for blocks and votes.
pub(crate) type Blake2b256 = blake2::Blake2b<blake2::digest::consts::U32>;

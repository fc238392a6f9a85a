//! Cryptographic primitives for lattice.
//!
//! - **Ed25519** for signing and verifying blocks and votes
//! - Accounts are Ed25519 public keys; hashing lives with the types in `lattice-types`

pub mod keys;
pub mod sign;

pub use keys::{account_from_private, generate_keypair, keypair_from_seed, KeyError};
pub use sign::{
    sign_block, sign_message, sign_vote, verify_block, verify_signature, verify_vote,
};

//! Representative votes.

use blake2::Digest;
use serde::{Deserialize, Serialize};

use crate::{Account, Blake2b256, BlockHash, Signature};

const VOTE_PREFIX: &[u8] = b"vote ";

/// A representative's endorsement of one or more block hashes at a logical time.
///
/// Votes with `timestamp == Vote::FINAL_TIMESTAMP` are final: irrevocable and
/// preferred over every non-final vote from the same representative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub account: Account,
    pub timestamp: u64,
    pub duration_bits: u8,
    pub hashes: Vec<BlockHash>,
    pub signature: Signature,
}

impl Vote {
    pub const FINAL_TIMESTAMP: u64 = u64::MAX;
    /// Upper bound on hashes carried by a single vote.
    pub const MAX_HASHES: usize = 255;

    pub fn new(account: Account, timestamp: u64, duration_bits: u8, hashes: Vec<BlockHash>) -> Self {
        Self {
            account,
            timestamp,
            duration_bits,
            hashes,
            signature: Signature::ZERO,
        }
    }

    pub fn new_final(account: Account, hashes: Vec<BlockHash>) -> Self {
        Self::new(account, Self::FINAL_TIMESTAMP, 0x0f, hashes)
    }

    pub fn is_final(&self) -> bool {
        self.timestamp == Self::FINAL_TIMESTAMP
    }

    /// Validity period in milliseconds encoded by `duration_bits`.
    pub fn duration_ms(&self) -> u64 {
        1u64 << ((self.duration_bits & 0x0f) + 4)
    }

    /// The message a representative signs: prefix, hashes, then timestamp.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut hasher = Blake2b256::new();
        hasher.update(VOTE_PREFIX);
        for hash in &self.hashes {
            hasher.update(hash.as_bytes());
        }
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update([self.duration_bits]);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep() -> Account {
        Account::new([1; 32])
    }

    #[test]
    fn final_vote_uses_max_timestamp() {
        let vote = Vote::new_final(rep(), vec![BlockHash::new([2; 32])]);
        assert!(vote.is_final());
        assert!(!Vote::new(rep(), 5, 0, vec![]).is_final());
    }

    #[test]
    fn signing_hash_covers_timestamp_and_hashes() {
        let hashes = vec![BlockHash::new([2; 32])];
        let a = Vote::new(rep(), 1, 0, hashes.clone());
        let b = Vote::new(rep(), 2, 0, hashes);
        let c = Vote::new(rep(), 1, 0, vec![BlockHash::new([3; 32])]);
        assert_ne!(a.signing_hash(), b.signing_hash());
        assert_ne!(a.signing_hash(), c.signing_hash());
    }

    #[test]
    fn signature_is_not_part_of_signing_hash() {
        let vote = Vote::new(rep(), 1, 0, vec![BlockHash::new([2; 32])]);
        let signed = vote.clone().with_signature(Signature([9; 64]));
        assert_eq!(vote.signing_hash(), signed.signing_hash());
    }

    #[test]
    fn duration_bits_scale() {
        assert_eq!(Vote::new(rep(), 1, 0, vec![]).duration_ms(), 16);
        assert_eq!(Vote::new(rep(), 1, 4, vec![]).duration_ms(), 256);
    }
}

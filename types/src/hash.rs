//! Block hashes and the roots that identify contested chain positions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{decode_hex, TypesError};
use crate::Account;

/// A 32-byte block hash. Blocks are content-addressed by this value.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl FromStr for BlockHash {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex::<32>(s).map(Self)
    }
}

/// The position a block occupies in its account chain.
///
/// For open blocks this is the account itself, otherwise the previous hash.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Root([u8; 32]);

impl Root {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<BlockHash> for Root {
    fn from(hash: BlockHash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl From<Account> for Root {
    fn from(account: Account) -> Self {
        Self(*account.as_bytes())
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Root({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

/// Root plus previous hash. Unique key of an election: two blocks with the
/// same qualified root are forks competing for one chain position.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
pub struct QualifiedRoot {
    pub root: Root,
    pub previous: BlockHash,
}

impl QualifiedRoot {
    pub fn new(root: Root, previous: BlockHash) -> Self {
        Self { root, previous }
    }

    /// 64-byte big-endian encoding, used as a storage key.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.root.as_bytes());
        out[32..].copy_from_slice(self.previous.as_bytes());
        out
    }
}

impl fmt::Display for QualifiedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_uppercase_hex() {
        let hash = BlockHash::new([0xab; 32]);
        assert_eq!(hash.to_string(), "AB".repeat(32));
    }

    #[test]
    fn parse_accepts_either_case() {
        let upper: BlockHash = "CD".repeat(32).parse().unwrap();
        let lower: BlockHash = "cd".repeat(32).parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper, BlockHash::new([0xcd; 32]));
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = "abcd".parse::<BlockHash>().unwrap_err();
        assert_eq!(
            err,
            TypesError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn qualified_root_orders_by_root_first() {
        let a = QualifiedRoot::new(Root::new([1; 32]), BlockHash::new([9; 32]));
        let b = QualifiedRoot::new(Root::new([2; 32]), BlockHash::new([0; 32]));
        assert!(a < b);
    }

    #[test]
    fn qualified_root_bytes_layout() {
        let qr = QualifiedRoot::new(Root::new([1; 32]), BlockHash::new([2; 32]));
        let bytes = qr.to_bytes();
        assert_eq!(&bytes[..32], &[1; 32]);
        assert_eq!(&bytes[32..], &[2; 32]);
    }
}

//! Account identifier: an Ed25519 public key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{decode_hex, TypesError};

/// A 32-byte account, equal to the account's Ed25519 public key.
///
/// Representatives are accounts too; the weight oracle keys on this type.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Account([u8; 32]);

impl Account {
    /// Text prefix used by `Display` and accepted by `FromStr`.
    pub const PREFIX: &'static str = "lat_";

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

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account({}{}\u{2026})", Self::PREFIX, hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, hex::encode(self.0))
    }
}

impl FromStr for Account {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| TypesError::InvalidAccount(s.to_string()))?;
        decode_hex::<32>(body).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_then_parse() {
        let account = Account::new([7; 32]);
        let text = account.to_string();
        assert!(text.starts_with("lat_"));
        assert_eq!(text.parse::<Account>().unwrap(), account);
    }

    #[test]
    fn parse_requires_prefix() {
        let err = "07".repeat(32).parse::<Account>().unwrap_err();
        assert!(matches!(err, TypesError::InvalidAccount(_)));
    }

    #[test]
    fn zero_account() {
        assert!(Account::ZERO.is_zero());
        assert!(!Account::new([1; 32]).is_zero());
    }
}

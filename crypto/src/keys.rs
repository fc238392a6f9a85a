//! Ed25519 key derivation.

use ed25519_dalek::SigningKey;
use lattice_types::{Account, KeyPair, PrivateKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("system randomness unavailable: {0}")]
    Entropy(String),
}

/// Generate a new key pair from the operating system's random source.
pub fn generate_keypair() -> Result<KeyPair, KeyError> {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).map_err(|e| KeyError::Entropy(e.to_string()))?;
    Ok(keypair_from_seed(&seed))
}

/// Derive the account (public key) that a private key signs for.
pub fn account_from_private(private: &PrivateKey) -> Account {
    let signing_key = SigningKey::from_bytes(&private.0);
    Account::new(signing_key.verifying_key().to_bytes())
}

/// Derive a key pair from a 32-byte seed (deterministic).
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing_key = SigningKey::from_bytes(seed);
    KeyPair {
        account: Account::new(signing_key.verifying_key().to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_derivation_is_deterministic() {
        let a = keypair_from_seed(&[7; 32]);
        let b = keypair_from_seed(&[7; 32]);
        assert_eq!(a.account, b.account);
        assert_eq!(account_from_private(&a.private), a.account);
    }

    #[test]
    fn generated_keys_differ() {
        let a = generate_keypair().unwrap();
        let b = generate_keypair().unwrap();
        assert_ne!(a.account, b.account);
    }
}

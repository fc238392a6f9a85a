//! Ed25519 signing and verification of blocks and votes.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use lattice_types::{Account, Block, PrivateKey, Signature, Vote};

/// Sign a message with a private key.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and the signing account.
///
/// Rejects malformed public keys as well as bad signatures.
pub fn verify_signature(message: &[u8], signature: &Signature, account: &Account) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(account.as_bytes()) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Sign a vote over its signing hash.
pub fn sign_vote(vote: Vote, private_key: &PrivateKey) -> Vote {
    let signature = sign_message(&vote.signing_hash(), private_key);
    vote.with_signature(signature)
}

/// Check a vote's signature against its representative account.
pub fn verify_vote(vote: &Vote) -> bool {
    verify_signature(&vote.signing_hash(), &vote.signature, &vote.account)
}

/// Sign a block over its hash.
pub fn sign_block(block: Block, private_key: &PrivateKey) -> Block {
    let signature = sign_message(block.hash().as_bytes(), private_key);
    block.with_signature(signature)
}

/// Check a block's signature against its account.
pub fn verify_block(block: &Block) -> bool {
    verify_signature(block.hash().as_bytes(), block.signature(), &block.account())
}

//! Account-chain blocks.

use blake2::Digest;
use serde::{Deserialize, Serialize};

use crate::{Account, Amount, Blake2b256, BlockHash, QualifiedRoot, Root, Signature};

/// Domain separator mixed into every block hash.
const BLOCK_PREAMBLE: [u8; 32] = {
    let mut p = [0u8; 32];
    p[31] = 6;
    p
};

/// An immutable state block.
///
/// The hash covers `account`, `previous`, `representative`, `balance` and
/// `link`. `height` is sideband data assigned by the ledger and is not hashed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    account: Account,
    previous: BlockHash,
    representative: Account,
    balance: Amount,
    link: [u8; 32],
    height: u64,
    signature: Signature,
    work: u64,
    hash: BlockHash,
}

impl Block {
    pub fn account(&self) -> Account {
        self.account
    }

    pub fn previous(&self) -> BlockHash {
        self.previous
    }

    pub fn representative(&self) -> Account {
        self.representative
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Destination account for sends, source hash for receives.
    pub fn link(&self) -> [u8; 32] {
        self.link
    }

    /// Position in the account chain, 1 for the open block.
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn work(&self) -> u64 {
        self.work
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn is_open(&self) -> bool {
        self.previous.is_zero()
    }

    pub fn root(&self) -> Root {
        if self.is_open() {
            self.account.into()
        } else {
            self.previous.into()
        }
    }

    pub fn qualified_root(&self) -> QualifiedRoot {
        QualifiedRoot::new(self.root(), self.previous)
    }

    /// Replace the signature. The hash is unaffected.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    fn compute_hash(&self) -> BlockHash {
        let mut hasher = Blake2b256::new();
        hasher.update(BLOCK_PREAMBLE);
        hasher.update(self.account.as_bytes());
        hasher.update(self.previous.as_bytes());
        hasher.update(self.representative.as_bytes());
        hasher.update(self.balance.to_be_bytes());
        hasher.update(self.link);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        BlockHash::new(out)
    }
}

/// Builder for [`Block`]. Unset fields default to zero; height defaults to 1.
pub struct BlockBuilder {
    account: Account,
    previous: BlockHash,
    representative: Account,
    balance: Amount,
    link: [u8; 32],
    height: u64,
    signature: Signature,
    work: u64,
}

impl BlockBuilder {
    pub fn new(account: Account) -> Self {
        Self {
            account,
            previous: BlockHash::ZERO,
            representative: account,
            balance: Amount::ZERO,
            link: [0u8; 32],
            height: 1,
            signature: Signature::ZERO,
            work: 0,
        }
    }

    pub fn previous(mut self, previous: BlockHash) -> Self {
        self.previous = previous;
        self
    }

    pub fn representative(mut self, representative: Account) -> Self {
        self.representative = representative;
        self
    }

    pub fn balance(mut self, balance: Amount) -> Self {
        self.balance = balance;
        self
    }

    pub fn link(mut self, link: [u8; 32]) -> Self {
        self.link = link;
        self
    }

    pub fn height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn work(mut self, work: u64) -> Self {
        self.work = work;
        self
    }

    pub fn build(self) -> Block {
        let mut block = Block {
            account: self.account,
            previous: self.previous,
            representative: self.representative,
            balance: self.balance,
            link: self.link,
            height: self.height,
            signature: self.signature,
            work: self.work,
            hash: BlockHash::ZERO,
        };
        block.hash = block.compute_hash();
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    #[test]
    fn open_block_root_is_account() {
        let block = BlockBuilder::new(account(1)).build();
        assert!(block.is_open());
        assert_eq!(block.root(), Root::from(account(1)));
        assert_eq!(block.qualified_root().previous, BlockHash::ZERO);
    }

    #[test]
    fn successor_root_is_previous() {
        let previous = BlockHash::new([5; 32]);
        let block = BlockBuilder::new(account(1)).previous(previous).height(2).build();
        assert_eq!(block.root(), Root::from(previous));
        assert_eq!(block.qualified_root(), QualifiedRoot::new(previous.into(), previous));
    }

    #[test]
    fn forks_share_qualified_root_but_not_hash() {
        let previous = BlockHash::new([5; 32]);
        let a = BlockBuilder::new(account(1))
            .previous(previous)
            .balance(Amount::raw(10))
            .build();
        let b = BlockBuilder::new(account(1))
            .previous(previous)
            .balance(Amount::raw(20))
            .build();
        assert_eq!(a.qualified_root(), b.qualified_root());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn signature_and_height_do_not_change_hash() {
        let base = BlockBuilder::new(account(3)).balance(Amount::raw(7));
        let plain = base.build();
        let decorated = BlockBuilder::new(account(3))
            .balance(Amount::raw(7))
            .height(9)
            .work(42)
            .build()
            .with_signature(Signature([1; 64]));
        assert_eq!(plain.hash(), decorated.hash());
    }
}

//! Bounded FIFO record of confirmed roots and winners.
//!
//! Late votes and rebroadcast blocks keep arriving after an election
//! finishes. The registry consults this set before starting an election so a
//! confirmed root is never elected a second time.

use lattice_types::{BlockHash, QualifiedRoot};
use std::collections::{HashMap, VecDeque};

pub struct RecentlyConfirmed {
    roots: HashMap<QualifiedRoot, BlockHash>,
    hashes: HashMap<BlockHash, QualifiedRoot>,
    order: VecDeque<QualifiedRoot>,
    capacity: usize,
}

impl RecentlyConfirmed {
    pub fn new(capacity: usize) -> Self {
        Self {
            roots: HashMap::new(),
            hashes: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Record `winner` as confirmed for `root`. Returns `false` if the root
    /// was already recorded.
    pub fn insert(&mut self, root: QualifiedRoot, winner: BlockHash) -> bool {
        if self.capacity == 0 || self.roots.contains_key(&root) {
            return false;
        }
        while self.order.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(hash) = self.roots.remove(&oldest) {
                self.hashes.remove(&hash);
            }
        }
        self.roots.insert(root, winner);
        self.hashes.insert(winner, root);
        self.order.push_back(root);
        true
    }

    pub fn contains_root(&self, root: &QualifiedRoot) -> bool {
        self.roots.contains_key(root)
    }

    pub fn contains_hash(&self, hash: &BlockHash) -> bool {
        self.hashes.contains_key(hash)
    }

    /// Winner recorded for `root`.
    pub fn winner(&self, root: &QualifiedRoot) -> Option<BlockHash> {
        self.roots.get(root).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.roots.clear();
        self.hashes.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_types::Root;

    fn make_root(byte: u8) -> QualifiedRoot {
        QualifiedRoot::new(Root::new([byte; 32]), BlockHash::new([byte; 32]))
    }

    fn make_hash(byte: u8) -> BlockHash {
        BlockHash::new([byte; 32])
    }

    #[test]
    fn insert_and_contains() {
        let mut rc = RecentlyConfirmed::new(10);
        assert!(rc.insert(make_root(1), make_hash(11)));
        assert!(rc.contains_root(&make_root(1)));
        assert!(rc.contains_hash(&make_hash(11)));
        assert_eq!(rc.winner(&make_root(1)), Some(make_hash(11)));
        assert_eq!(rc.len(), 1);
    }

    #[test]
    fn duplicate_root_is_rejected() {
        let mut rc = RecentlyConfirmed::new(10);
        rc.insert(make_root(1), make_hash(11));
        assert!(!rc.insert(make_root(1), make_hash(12)));
        assert_eq!(rc.winner(&make_root(1)), Some(make_hash(11)));
        assert!(!rc.contains_hash(&make_hash(12)));
    }

    #[test]
    fn fifo_eviction() {
        let mut rc = RecentlyConfirmed::new(2);
        rc.insert(make_root(1), make_hash(11));
        rc.insert(make_root(2), make_hash(12));
        rc.insert(make_root(3), make_hash(13));

        assert_eq!(rc.len(), 2);
        assert!(!rc.contains_root(&make_root(1)));
        assert!(!rc.contains_hash(&make_hash(11)));
        assert!(rc.contains_root(&make_root(2)));
        assert!(rc.contains_root(&make_root(3)));
    }

    #[test]
    fn zero_capacity() {
        let mut rc = RecentlyConfirmed::new(0);
        assert!(!rc.insert(make_root(1), make_hash(11)));
        assert!(rc.is_empty());
    }

    #[test]
    fn clear() {
        let mut rc = RecentlyConfirmed::new(4);
        rc.insert(make_root(1), make_hash(11));
        rc.clear();
        assert!(rc.is_empty());
        assert!(!rc.contains_hash(&make_hash(11)));
    }
}

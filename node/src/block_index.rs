//! Recently received blocks, by hash.
//!
//! The hinted scheduler learns hashes from cached votes and needs the block
//! itself to start an election. Every block the node is told about lands
//! here; the oldest is forgotten once the index is full.

use lattice_consensus::BlockSource;
use lattice_types::{Block, BlockHash};
use lattice_utils::MutexExt;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct IndexData {
    blocks: HashMap<BlockHash, Arc<Block>>,
    order: VecDeque<BlockHash>,
}

pub struct BlockIndex {
    capacity: usize,
    data: Mutex<IndexData>,
}

impl BlockIndex {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            data: Mutex::new(IndexData::default()),
        }
    }

    /// Returns `false` if the block was already indexed.
    pub fn insert(&self, block: Arc<Block>) -> bool {
        let hash = block.hash();
        let mut data = self.data.locked();
        if data.blocks.contains_key(&hash) {
            return false;
        }
        data.blocks.insert(hash, block);
        data.order.push_back(hash);
        while data.order.len() > self.capacity {
            if let Some(oldest) = data.order.pop_front() {
                data.blocks.remove(&oldest);
            }
        }
        true
    }

    pub fn get(&self, hash: &BlockHash) -> Option<Arc<Block>> {
        self.data.locked().blocks.get(hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.data.locked().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockSource for BlockIndex {
    fn block(&self, hash: &BlockHash) -> Option<Arc<Block>> {
        self.get(hash)
    }
}

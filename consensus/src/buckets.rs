//! Balance-partitioned priority queues feeding the priority scheduler.
//!
//! Blocks land in one of 62 buckets chosen by the account balance, and
//! inside a bucket they are ordered by time (older first). Buckets are served
//! round robin so that a flood of blocks from one balance class cannot starve
//! the others.

use lattice_types::{Amount, Block, BlockHash};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketsConfig {
    /// Capacity of the whole container; every bucket gets an equal share.
    pub max_blocks: usize,
}

impl Default for BucketsConfig {
    fn default() -> Self {
        Self { max_blocks: 8192 }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    time: u64,
    block: Arc<Block>,
}

impl Entry {
    fn key(&self) -> (u64, BlockHash) {
        (self.time, self.block.hash())
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Entry {}

/// Blocks of one balance class, ordered by `(time, hash)`.
struct Bucket {
    maximum: usize,
    queue: BTreeSet<Entry>,
}

impl Bucket {
    fn new(maximum: usize) -> Self {
        Self {
            maximum,
            queue: BTreeSet::new(),
        }
    }

    fn top(&self) -> Option<&Arc<Block>> {
        self.queue.first().map(|e| &e.block)
    }

    fn pop(&mut self) -> Option<Arc<Block>> {
        self.queue.pop_first().map(|e| e.block)
    }

    /// Returns `false` if the block was a duplicate or was itself evicted.
    fn push(&mut self, time: u64, block: Arc<Block>) -> bool {
        let key = (time, block.hash());
        if !self.queue.insert(Entry { time, block }) {
            return false;
        }
        if self.queue.len() > self.maximum {
            if let Some(evicted) = self.queue.pop_last() {
                return evicted.key() != key;
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Lower balance bound of every bucket. Bucket 0 starts at zero and the last
/// bucket holds everything from 2^120 raw upwards.
fn bucket_minimums() -> Vec<u128> {
    let mut minimums = vec![0u128];
    let mut region = |begin: u128, end: u128, count: u128| {
        let width = (end - begin) / count;
        minimums.extend((0..count).map(|i| begin + i * width));
    };
    region(1 << 88, 1 << 92, 2);
    region(1 << 92, 1 << 96, 4);
    region(1 << 96, 1 << 100, 8);
    region(1 << 100, 1 << 104, 16);
    region(1 << 104, 1 << 108, 16);
    region(1 << 108, 1 << 112, 8);
    region(1 << 112, 1 << 116, 4);
    region(1 << 116, 1 << 120, 2);
    minimums.push(1 << 120);
    minimums
}

pub struct Buckets {
    buckets: Vec<Bucket>,
    minimums: Vec<u128>,
    /// Bucket served by the next `top`/`pop`.
    current: usize,
}

impl Buckets {
    pub fn new(config: BucketsConfig) -> Self {
        let minimums = bucket_minimums();
        let bucket_max = (config.max_blocks / minimums.len()).max(1);
        let buckets = minimums.iter().map(|_| Bucket::new(bucket_max)).collect();
        Self {
            buckets,
            minimums,
            current: 0,
        }
    }

    /// Queue `block` in the bucket for `priority`.
    ///
    /// Returns `true` if the block is now queued. A full bucket drops its
    /// newest entry, which may be the block just pushed.
    pub fn push(&mut self, time: u64, block: Arc<Block>, priority: Amount) -> bool {
        let was_empty = self.is_empty();
        let index = self.index(priority);
        let queued = self.buckets[index].push(time, block);
        if was_empty {
            self.seek();
        }
        queued
    }

    /// Oldest block of the current bucket.
    pub fn top(&self) -> Option<&Arc<Block>> {
        self.buckets[self.current].top()
    }

    /// Remove the oldest block of the current bucket and move on to the
    /// next non-empty bucket.
    pub fn pop(&mut self) -> Option<Arc<Block>> {
        let block = self.buckets[self.current].pop();
        self.seek();
        block
    }

    /// Bucket index for a balance. Monotonic in `amount`.
    pub fn index(&self, amount: Amount) -> usize {
        let value = amount.number();
        self.minimums.partition_point(|min| *min <= value) - 1
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Bucket::is_empty)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_size(&self, index: usize) -> usize {
        self.buckets.get(index).map_or(0, Bucket::len)
    }

    /// Index of the bucket `top`/`pop` will serve.
    pub fn current(&self) -> usize {
        self.current
    }

    fn next(&mut self) {
        self.current = (self.current + 1) % self.buckets.len();
    }

    fn seek(&mut self) {
        self.next();
        for _ in 0..self.buckets.len() {
            if !self.buckets[self.current].is_empty() {
                break;
            }
            self.next();
        }
    }
}

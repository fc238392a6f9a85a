//! Named statistics counters.
//!
//! Benign no-ops in the election core (stale votes, full limiters, cache
//! evictions) are only ever visible through these counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::sync::RwLockExt;

/// A thread-safe collection of monotonically increasing counters.
///
/// Counters are created on first use. Names are conventionally
/// `"<component>.<detail>"`, e.g. `"vote_cache.evicted"`.
#[derive(Default)]
pub struct StatsCounter {
    counters: RwLock<BTreeMap<&'static str, Arc<AtomicU64>>>,
}

impl StatsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &'static str, value: u64) {
        self.counter(name).fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .read_locked()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All counters, sorted by name.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        self.counters
            .read_locked()
            .iter()
            .map(|(&k, v)| (k, v.load(Ordering::Relaxed)))
            .collect()
    }

    fn counter(&self, name: &'static str) -> Arc<AtomicU64> {
        if let Some(counter) = self.counters.read_locked().get(name) {
            return Arc::clone(counter);
        }
        Arc::clone(self.counters.write_locked().entry(name).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_counter_reads_zero() {
        let stats = StatsCounter::new();
        assert_eq!(stats.get("election.confirmed"), 0);
    }

    #[test]
    fn increment_and_add() {
        let stats = StatsCounter::new();
        stats.increment("vote.replay");
        stats.add("vote.replay", 4);
        assert_eq!(stats.get("vote.replay"), 5);
    }

    #[test]
    fn snapshot_is_sorted() {
        let stats = StatsCounter::new();
        stats.increment("b");
        stats.increment("a");
        let names: Vec<_> = stats.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn concurrent_increments() {
        let stats = Arc::new(StatsCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.increment("hits");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.get("hits"), 4000);
    }
}

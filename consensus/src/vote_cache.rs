//! Vote cache: votes for blocks that have no live election.
//!
//! Representatives can vote for a block before this node has started an
//! election for it, or after the election was dropped. Those votes are kept
//! here, keyed by block hash, so a newly created election can be seeded with
//! them instead of waiting for the network to repeat itself. Blocks whose
//! cached tally grows large enough are also picked up by the hinted
//! scheduler.
//!
//! The cache is bounded in two directions: at most `max_size` hashes (the
//! oldest inserted hash is evicted first) and at most `max_voters` voters per
//! hash (the lightest voter makes room for a heavier one).

use lattice_types::{Account, Amount, BlockHash, Timestamp, Vote};
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteCacheConfig {
    pub max_size: usize,
    pub max_voters: usize,
    /// Entries without a new vote for this long are dropped by [`VoteCache::top`].
    pub age_cutoff_secs: u64,
}

impl Default for VoteCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1024,
            max_voters: 64,
            age_cutoff_secs: 15 * 60,
        }
    }
}

/// One representative's latest vote for a cached hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedVote {
    pub representative: Account,
    pub timestamp: u64,
    /// Weight of the representative when the vote was cached.
    pub weight: Amount,
}

impl CachedVote {
    pub fn is_final(&self) -> bool {
        self.timestamp == Vote::FINAL_TIMESTAMP
    }
}

/// All cached votes for a single block hash.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    id: u64,
    pub hash: BlockHash,
    pub voters: Vec<CachedVote>,
    pub tally: Amount,
    pub final_tally: Amount,
    pub last_vote: Timestamp,
}

impl CacheEntry {
    fn new(id: u64, hash: BlockHash, now: Timestamp) -> Self {
        Self {
            id,
            hash,
            voters: Vec::new(),
            tally: Amount::ZERO,
            final_tally: Amount::ZERO,
            last_vote: now,
        }
    }

    /// Record a vote. Returns `true` if the entry changed.
    fn vote(
        &mut self,
        representative: &Account,
        timestamp: u64,
        weight: Amount,
        max_voters: usize,
        now: Timestamp,
    ) -> bool {
        let changed = self.vote_impl(representative, timestamp, weight, max_voters);
        if changed {
            self.last_vote = now;
            self.recalculate();
        }
        changed
    }

    fn vote_impl(
        &mut self,
        representative: &Account,
        timestamp: u64,
        weight: Amount,
        max_voters: usize,
    ) -> bool {
        if let Some(existing) = self
            .voters
            .iter_mut()
            .find(|v| v.representative == *representative)
        {
            if timestamp <= existing.timestamp {
                return false;
            }
            existing.timestamp = timestamp;
            existing.weight = weight;
            return true;
        }

        let voter = CachedVote {
            representative: *representative,
            timestamp,
            weight,
        };
        if self.voters.len() < max_voters {
            self.voters.push(voter);
            return true;
        }

        let lightest = self
            .voters
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.weight)
            .map(|(i, v)| (i, v.weight));
        match lightest {
            Some((index, lightest_weight)) if weight > lightest_weight => {
                self.voters[index] = voter;
                true
            }
            _ => false,
        }
    }

    fn recalculate(&mut self) {
        self.tally = self.voters.iter().map(|v| v.weight).sum();
        self.final_tally = self
            .voters
            .iter()
            .filter(|v| v.is_final())
            .map(|v| v.weight)
            .sum();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopEntry {
    pub hash: BlockHash,
    pub tally: Amount,
    pub final_tally: Amount,
}

/// Evictions and insertions performed by one [`VoteCache::insert`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub evicted: usize,
}

pub struct VoteCache {
    config: VoteCacheConfig,
    entries: HashMap<BlockHash, CacheEntry>,
    /// Insertion id → hash. The first key is the oldest entry.
    order: BTreeMap<u64, BlockHash>,
    next_id: u64,
}

impl VoteCache {
    pub fn new(config: VoteCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn config(&self) -> &VoteCacheConfig {
        &self.config
    }

    /// Cache `vote` for every hash it covers.
    pub fn insert(&mut self, vote: &Vote, rep_weight: Amount, now: Timestamp) -> InsertOutcome {
        self.insert_filtered(vote, rep_weight, now, |_| true)
    }

    /// Cache `vote` for the hashes accepted by `filter`.
    pub fn insert_filtered(
        &mut self,
        vote: &Vote,
        rep_weight: Amount,
        now: Timestamp,
        filter: impl Fn(&BlockHash) -> bool,
    ) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();
        for hash in vote.hashes.iter().filter(|h| filter(h)) {
            if let Some(entry) = self.entries.get_mut(hash) {
                if entry.vote(
                    &vote.account,
                    vote.timestamp,
                    rep_weight,
                    self.config.max_voters,
                    now,
                ) {
                    outcome.updated += 1;
                }
                continue;
            }

            let id = self.next_id;
            self.next_id += 1;
            let mut entry = CacheEntry::new(id, *hash, now);
            entry.vote(
                &vote.account,
                vote.timestamp,
                rep_weight,
                self.config.max_voters,
                now,
            );
            self.entries.insert(*hash, entry);
            self.order.insert(id, *hash);
            outcome.inserted += 1;

            while self.entries.len() > self.config.max_size {
                if self.pop_oldest().is_none() {
                    break;
                }
                outcome.evicted += 1;
            }
        }
        outcome
    }

    /// Latest cached vote per representative for `hash`; empty if unknown.
    pub fn find(&self, hash: &BlockHash) -> Vec<CachedVote> {
        self.entries
            .get(hash)
            .map(|e| e.voters.clone())
            .unwrap_or_default()
    }

    pub fn entry(&self, hash: &BlockHash) -> Option<&CacheEntry> {
        self.entries.get(hash)
    }

    /// Removes the entry for `hash`. Returns whether one existed.
    pub fn erase(&mut self, hash: &BlockHash) -> bool {
        match self.entries.remove(hash) {
            Some(entry) => {
                self.order.remove(&entry.id);
                true
            }
            None => false,
        }
    }

    /// Entries with at least `min_tally`, sorted by final tally then tally,
    /// both descending. Entries older than the age cutoff are dropped first.
    pub fn top(&mut self, min_tally: Amount, now: Timestamp) -> Vec<TopEntry> {
        self.cleanup(now);

        let mut results: Vec<TopEntry> = self
            .entries
            .values()
            .filter(|e| e.tally >= min_tally)
            .map(|e| TopEntry {
                hash: e.hash,
                tally: e.tally,
                final_tally: e.final_tally,
            })
            .collect();
        results.sort_by(|a, b| {
            b.final_tally
                .cmp(&a.final_tally)
                .then_with(|| b.tally.cmp(&a.tally))
                .then_with(|| a.hash.cmp(&b.hash))
        });
        results
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn pop_oldest(&mut self) -> Option<BlockHash> {
        let (_, hash) = self.order.pop_first()?;
        self.entries.remove(&hash);
        Some(hash)
    }

    fn cleanup(&mut self, now: Timestamp) {
        let cutoff = self.config.age_cutoff_secs;
        let stale: Vec<(u64, BlockHash)> = self
            .entries
            .values()
            .filter(|e| e.last_vote.has_expired(cutoff, now))
            .map(|e| (e.id, e.hash))
            .collect();
        for (id, hash) in stale {
            self.order.remove(&id);
            self.entries.remove(&hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rep(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn hash(byte: u8) -> BlockHash {
        BlockHash::new([byte; 32])
    }

    fn vote(rep_byte: u8, timestamp: u64, hashes: &[u8]) -> Vote {
        Vote::new(rep(rep_byte), timestamp, 0, hashes.iter().map(|b| hash(*b)).collect())
    }

    fn cache(max_size: usize, max_voters: usize) -> VoteCache {
        VoteCache::new(VoteCacheConfig {
            max_size,
            max_voters,
            age_cutoff_secs: 900,
        })
    }

    const NOW: Timestamp = Timestamp::new(1_000);

    #[test]
    fn construction() {
        let cache = cache(10, 4);
        assert!(cache.is_empty());
        assert!(cache.find(&hash(1)).is_empty());
    }

    #[test]
    fn insert_one_hash_many_votes() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(7), NOW);
        cache.insert(&vote(2, 1, &[1]), Amount::raw(9), NOW);
        let entry = cache.entry(&hash(1)).unwrap();
        assert_eq!(entry.voters.len(), 2);
        assert_eq!(entry.tally, Amount::raw(16));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn vote_covering_several_hashes() {
        let mut cache = cache(10, 4);
        let outcome = cache.insert(&vote(1, 1, &[1, 2, 3]), Amount::raw(5), NOW);
        assert_eq!(outcome.inserted, 3);
        assert_eq!(cache.len(), 3);
        for h in 1..=3 {
            assert_eq!(cache.find(&hash(h)).len(), 1);
        }
    }

    #[test]
    fn insert_duplicate_does_not_double_count() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(7), NOW);
        let outcome = cache.insert(&vote(1, 1, &[1]), Amount::raw(7), NOW);
        assert_eq!(outcome.updated, 0);
        assert_eq!(cache.entry(&hash(1)).unwrap().tally, Amount::raw(7));
    }

    #[test]
    fn insert_newer_replaces_timestamp() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(7), NOW);
        cache.insert(&vote(1, 5, &[1]), Amount::raw(7), NOW);
        let voters = cache.find(&hash(1));
        assert_eq!(voters.len(), 1);
        assert_eq!(voters[0].timestamp, 5);
    }

    #[test]
    fn insert_older_is_ignored() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 5, &[1]), Amount::raw(7), NOW);
        cache.insert(&vote(1, 2, &[1]), Amount::raw(7), NOW);
        assert_eq!(cache.find(&hash(1))[0].timestamp, 5);
    }

    #[test]
    fn change_vote_to_final_vote() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 5, &[1]), Amount::raw(7), NOW);
        assert_eq!(cache.entry(&hash(1)).unwrap().final_tally, Amount::ZERO);
        cache.insert(&Vote::new_final(rep(1), vec![hash(1)]), Amount::raw(7), NOW);
        let entry = cache.entry(&hash(1)).unwrap();
        assert_eq!(entry.tally, Amount::raw(7));
        assert_eq!(entry.final_tally, Amount::raw(7));
    }

    #[test]
    fn erase() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 1, &[1, 2]), Amount::raw(7), NOW);
        assert!(cache.erase(&hash(1)));
        assert!(!cache.erase(&hash(1)));
        assert!(cache.find(&hash(1)).is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn oldest_entry_evicted_at_capacity() {
        let mut cache = cache(2, 4);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(1), NOW);
        cache.insert(&vote(1, 1, &[2]), Amount::raw(1), NOW);
        let outcome = cache.insert(&vote(1, 1, &[3]), Amount::raw(1), NOW);

        assert_eq!(outcome.evicted, 1);
        assert!(cache.find(&hash(1)).is_empty());
        assert!(!cache.find(&hash(2)).is_empty());
        assert!(!cache.find(&hash(3)).is_empty());
    }

    #[test]
    fn updating_an_entry_does_not_refresh_its_age_in_eviction_order() {
        let mut cache = cache(2, 4);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(1), NOW);
        cache.insert(&vote(1, 1, &[2]), Amount::raw(1), NOW);
        cache.insert(&vote(2, 1, &[1]), Amount::raw(1), NOW);
        cache.insert(&vote(1, 1, &[3]), Amount::raw(1), NOW);
        assert!(cache.entry(&hash(1)).is_none());
    }

    #[test]
    fn erased_entries_leave_eviction_order() {
        let mut cache = cache(2, 4);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(1), NOW);
        cache.insert(&vote(1, 1, &[2]), Amount::raw(1), NOW);
        cache.erase(&hash(1));
        cache.insert(&vote(1, 1, &[3]), Amount::raw(1), NOW);
        assert_eq!(cache.len(), 2);
        assert!(cache.entry(&hash(2)).is_some());
    }

    #[test]
    fn full_entry_replaces_lightest_voter_with_heavier() {
        let mut cache = cache(10, 2);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(5), NOW);
        cache.insert(&vote(2, 1, &[1]), Amount::raw(3), NOW);
        cache.insert(&vote(3, 1, &[1]), Amount::raw(1), NOW);
        assert_eq!(cache.entry(&hash(1)).unwrap().tally, Amount::raw(8));

        cache.insert(&vote(4, 1, &[1]), Amount::raw(10), NOW);
        let entry = cache.entry(&hash(1)).unwrap();
        assert_eq!(entry.tally, Amount::raw(15));
        assert!(entry.voters.iter().all(|v| v.representative != rep(2)));
    }

    #[test]
    fn insert_filtered_skips_rejected_hashes() {
        let mut cache = cache(10, 4);
        cache.insert_filtered(&vote(1, 1, &[1, 2]), Amount::raw(1), NOW, |h| *h != hash(1));
        assert!(cache.entry(&hash(1)).is_none());
        assert!(cache.entry(&hash(2)).is_some());
    }

    #[test]
    fn top_sorted_by_final_tally_then_tally() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(30), NOW);
        cache.insert(&vote(2, 1, &[2]), Amount::raw(20), NOW);
        cache.insert(&Vote::new_final(rep(3), vec![hash(3)]), Amount::raw(10), NOW);

        let top: Vec<BlockHash> = cache.top(Amount::ZERO, NOW).iter().map(|e| e.hash).collect();
        assert_eq!(top, vec![hash(3), hash(1), hash(2)]);
    }

    #[test]
    fn top_min_tally() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(30), NOW);
        cache.insert(&vote(2, 1, &[2]), Amount::raw(20), NOW);
        let top = cache.top(Amount::raw(25), NOW);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].hash, hash(1));
    }

    #[test]
    fn top_drops_entries_past_age_cutoff() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 1, &[1]), Amount::raw(30), Timestamp::new(0));
        cache.insert(&vote(1, 1, &[2]), Amount::raw(30), Timestamp::new(500));
        let top = cache.top(Amount::ZERO, Timestamp::new(900));
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].hash, hash(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let mut cache = cache(10, 4);
        cache.insert(&vote(1, 1, &[1, 2]), Amount::raw(1), NOW);
        cache.clear();
        assert!(cache.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_exceeds_capacity(
                max_size in 1usize..8,
                votes in prop::collection::vec((0u8..6, 0u64..4, 0u8..20), 0..60),
            ) {
                let mut cache = cache(max_size, 3);
                for (r, ts, h) in votes {
                    cache.insert(&vote(r, ts, &[h]), Amount::raw(1), NOW);
                    prop_assert!(cache.len() <= max_size);
                    prop_assert_eq!(cache.order.len(), cache.entries.len());
                }
            }
        }
    }
}

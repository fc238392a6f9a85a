//! Registry of running elections.
//!
//! At most one election exists per qualified root. The registry routes votes
//! to elections through a block hash index, seeds new elections from the
//! vote cache, and completes elections once they reach a terminal state:
//! the confirmation height is written, the creator's erase callback fires,
//! and observers are notified. Completion happens exactly once per election,
//! on whichever thread removes it from the registry, and always outside the
//! registry lock.

use lattice_types::{Block, BlockHash, QualifiedRoot, Timestamp, Vote};
use lattice_utils::{MutexExt, RwLockExt, StatsCounter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use crate::confirmation::ConfirmationWriter;
use crate::election::{Election, ElectionBehavior, ElectionConfig};
use crate::observer::{ElectionObserver, ObserverError};
use crate::online_reps::OnlineReps;
use crate::recently_confirmed::RecentlyConfirmed;
use crate::rep_weights::RepWeights;
use crate::vote_cache::VoteCache;
use crate::vote_info::{VoteCode, VoteSource};

/// Invoked once when an election leaves the registry.
pub type ErasedCallback = Box<dyn FnOnce(&Arc<Election>) + Send>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveElectionsConfig {
    /// Time to live of priority and manual elections.
    pub election_expiry_secs: u64,
    /// Time to live of hinted and optimistic elections.
    pub short_election_expiry_secs: u64,
    pub max_blocks_per_election: usize,
    pub passive_secs: u64,
    pub confirmation_request_interval_secs: u64,
    pub recently_confirmed_size: usize,
}

impl Default for ActiveElectionsConfig {
    fn default() -> Self {
        Self {
            election_expiry_secs: 5 * 60,
            short_election_expiry_secs: 30,
            max_blocks_per_election: 10,
            passive_secs: 5,
            confirmation_request_interval_secs: 5,
            recently_confirmed_size: 65536,
        }
    }
}

impl ActiveElectionsConfig {
    pub fn election_config(&self, behavior: ElectionBehavior) -> ElectionConfig {
        let ttl_secs = match behavior {
            ElectionBehavior::Priority | ElectionBehavior::Manual => self.election_expiry_secs,
            ElectionBehavior::Hinted | ElectionBehavior::Optimistic => {
                self.short_election_expiry_secs
            }
        };
        ElectionConfig {
            max_blocks: self.max_blocks_per_election,
            passive_secs: self.passive_secs,
            ttl_secs,
        }
    }
}

/// What one housekeeping pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub finished: usize,
    pub requested: usize,
}

struct Entry {
    election: Arc<Election>,
    erased_callback: Option<ErasedCallback>,
}

struct ActiveElectionsData {
    roots: HashMap<QualifiedRoot, Entry>,
    /// Candidate hash → root of the election tracking it.
    blocks: HashMap<BlockHash, QualifiedRoot>,
    recently_confirmed: RecentlyConfirmed,
}

pub struct ActiveElections {
    config: ActiveElectionsConfig,
    rep_weights: Arc<RepWeights>,
    online_reps: Arc<OnlineReps>,
    vote_cache: Arc<Mutex<VoteCache>>,
    confirmation: ConfirmationWriter,
    observers: RwLock<Vec<Arc<dyn ElectionObserver>>>,
    stats: Arc<StatsCounter>,
    data: Mutex<ActiveElectionsData>,
}

impl ActiveElections {
    pub fn new(
        config: ActiveElectionsConfig,
        rep_weights: Arc<RepWeights>,
        online_reps: Arc<OnlineReps>,
        vote_cache: Arc<Mutex<VoteCache>>,
        confirmation: ConfirmationWriter,
        stats: Arc<StatsCounter>,
    ) -> Self {
        let recently_confirmed = RecentlyConfirmed::new(config.recently_confirmed_size);
        Self {
            config,
            rep_weights,
            online_reps,
            vote_cache,
            confirmation,
            observers: RwLock::new(Vec::new()),
            stats,
            data: Mutex::new(ActiveElectionsData {
                roots: HashMap::new(),
                blocks: HashMap::new(),
                recently_confirmed,
            }),
        }
    }

    pub fn config(&self) -> &ActiveElectionsConfig {
        &self.config
    }

    pub fn rep_weights(&self) -> &Arc<RepWeights> {
        &self.rep_weights
    }

    pub fn online_reps(&self) -> &Arc<OnlineReps> {
        &self.online_reps
    }

    pub fn vote_cache(&self) -> &Arc<Mutex<VoteCache>> {
        &self.vote_cache
    }

    pub fn confirmation(&self) -> &ConfirmationWriter {
        &self.confirmation
    }

    pub fn stats(&self) -> &Arc<StatsCounter> {
        &self.stats
    }

    pub fn add_observer(&self, observer: Arc<dyn ElectionObserver>) {
        self.observers.write_locked().push(observer);
    }

    /// Start an election for `block`'s root.
    ///
    /// If an election for the root is already running it is returned with
    /// `inserted == false` and `erased_callback` is dropped unused. Roots
    /// confirmed recently, and blocks at or below their account's
    /// confirmation height, are refused with `(None, false)`. A new election
    /// is seeded with cached votes for `block` and may be complete (and
    /// removed again) by the time this returns.
    pub fn insert(
        &self,
        block: Arc<Block>,
        behavior: ElectionBehavior,
        erased_callback: Option<ErasedCallback>,
        now: Timestamp,
    ) -> (Option<Arc<Election>>, bool) {
        let root = block.qualified_root();
        let hash = block.hash();

        if self.is_cemented(&block) {
            self.stats.increment("active.already_cemented");
            trace!(root = %root, hash = %hash, "block already cemented");
            return (None, false);
        }

        let election = {
            let mut data = self.data.locked();
            if let Some(existing) = data.roots.get(&root) {
                self.stats.increment("active.duplicate");
                return (Some(existing.election.clone()), false);
            }
            if data.recently_confirmed.contains_root(&root) {
                self.stats.increment("active.recently_confirmed");
                return (None, false);
            }
            let election = Arc::new(Election::new(
                block,
                behavior,
                self.config.election_config(behavior),
                self.rep_weights.clone(),
                self.online_reps.clone(),
                now,
            ));
            data.roots.insert(
                root,
                Entry {
                    election: election.clone(),
                    erased_callback,
                },
            );
            data.blocks.insert(hash, root);
            election
        };

        self.stats.increment("active.started");
        debug!(root = %root, hash = %hash, %behavior, "election started");
        self.notify(|o| o.on_active_started(&root, behavior));

        self.seed_from_cache(&election, &hash, now);
        if election.is_confirmed() {
            self.complete(&election);
        }

        (Some(election), true)
    }

    /// Route `vote` to the elections tracking its hashes.
    ///
    /// Hashes with no running election report `Indeterminate`, hashes that
    /// won a recently confirmed election report `Ignored`.
    pub fn vote(&self, vote: &Vote, now: Timestamp) -> HashMap<BlockHash, VoteCode> {
        let mut results = HashMap::new();
        let mut targets = Vec::new();
        {
            let data = self.data.locked();
            for hash in &vote.hashes {
                let election = data
                    .blocks
                    .get(hash)
                    .and_then(|root| data.roots.get(root))
                    .map(|entry| entry.election.clone());
                match election {
                    Some(election) => targets.push((*hash, election)),
                    None if data.recently_confirmed.contains_hash(hash) => {
                        results.insert(*hash, VoteCode::Ignored);
                    }
                    None => {
                        results.insert(*hash, VoteCode::Indeterminate);
                    }
                }
            }
        }

        for (hash, election) in targets {
            let code = election.vote(&vote.account, vote.timestamp, &hash, VoteSource::Live, now);
            results.insert(hash, code);
            if election.is_confirmed() {
                self.complete(&election);
            }
        }

        for code in results.values() {
            self.stats.increment(vote_code_stat(*code));
        }
        results
    }

    /// Add a fork of a running election as a new candidate.
    ///
    /// Cached votes for the fork are moved into the election. Returns
    /// `false` if no election runs for the block's root or the election
    /// refused the candidate.
    pub fn publish(&self, block: Arc<Block>, now: Timestamp) -> bool {
        let root = block.qualified_root();
        let hash = block.hash();
        let Some(election) = self.election(&root) else {
            return false;
        };
        if !election.insert_candidate(block, now) {
            return false;
        }
        let live = {
            let mut data = self.data.locked();
            let live = data
                .roots
                .get(&root)
                .is_some_and(|entry| Arc::ptr_eq(&entry.election, &election));
            if live {
                data.blocks.insert(hash, root);
            }
            live
        };
        if live {
            self.seed_from_cache(&election, &hash, now);
        }
        self.stats.increment("active.fork");
        if election.is_confirmed() {
            self.complete(&election);
        }
        true
    }

    /// Confirm the current winner of the election for `root`.
    pub fn force_confirm(&self, root: &QualifiedRoot, now: Timestamp) -> bool {
        let Some(election) = self.election(root) else {
            return false;
        };
        let confirmed = election.force_confirm(now);
        if election.is_terminal() {
            self.complete(&election);
        }
        confirmed
    }

    /// Housekeeping: advance every election's clock, finish elections that
    /// expired, and ask observers to solicit votes for the rest.
    pub fn tick(&self, now: Timestamp) -> TickSummary {
        let mut summary = TickSummary::default();
        for election in self.list() {
            if election.transition_time(now) {
                self.complete(&election);
                summary.finished += 1;
                continue;
            }
            if election
                .should_request_confirmation(now, self.config.confirmation_request_interval_secs)
            {
                let winner = election.winner();
                self.notify(|o| o.on_confirmation_requested(election.root(), &winner));
                summary.requested += 1;
            }
        }
        summary
    }

    pub fn election(&self, root: &QualifiedRoot) -> Option<Arc<Election>> {
        self.data
            .locked()
            .roots
            .get(root)
            .map(|entry| entry.election.clone())
    }

    /// Election tracking `hash` as a candidate.
    pub fn election_for_block(&self, hash: &BlockHash) -> Option<Arc<Election>> {
        let data = self.data.locked();
        data.blocks
            .get(hash)
            .and_then(|root| data.roots.get(root))
            .map(|entry| entry.election.clone())
    }

    pub fn is_active_root(&self, root: &QualifiedRoot) -> bool {
        self.data.locked().roots.contains_key(root)
    }

    pub fn is_recently_confirmed(&self, hash: &BlockHash) -> bool {
        self.data.locked().recently_confirmed.contains_hash(hash)
    }

    pub fn recently_confirmed_len(&self) -> usize {
        self.data.locked().recently_confirmed.len()
    }

    pub fn list(&self) -> Vec<Arc<Election>> {
        self.data
            .locked()
            .roots
            .values()
            .map(|entry| entry.election.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.data.locked().roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len_by_behavior(&self, behavior: ElectionBehavior) -> usize {
        self.data
            .locked()
            .roots
            .values()
            .filter(|entry| entry.election.behavior() == behavior)
            .count()
    }

    /// Whether `block`'s account is confirmed at or above its height. A
    /// failed lookup is logged and treated as not cemented; the
    /// confirmation write refuses to move the height back regardless.
    fn is_cemented(&self, block: &Block) -> bool {
        match self.confirmation.confirmation_height(&block.account()) {
            Ok(info) => info.is_some_and(|info| info.height >= block.height()),
            Err(err) => {
                warn!(account = %block.account(), error = %err, "confirmation height lookup failed");
                false
            }
        }
    }

    /// Move cached votes for `hash` into `election`.
    fn seed_from_cache(&self, election: &Election, hash: &BlockHash, now: Timestamp) {
        let cached = {
            let mut cache = self.vote_cache.locked();
            let voters = cache.find(hash);
            cache.erase(hash);
            voters
        };
        if cached.is_empty() {
            return;
        }
        trace!(root = %election.root(), hash = %hash, voters = cached.len(), "seeding election from vote cache");
        for voter in cached {
            election.vote(&voter.representative, voter.timestamp, hash, VoteSource::Cache, now);
        }
    }

    /// Remove a terminal election and run its completion side effects.
    ///
    /// Only the caller that actually removes the entry proceeds, so the
    /// confirmation write and callbacks run once per election.
    fn complete(&self, election: &Arc<Election>) {
        let root = *election.root();
        let entry = {
            let mut data = self.data.locked();
            let owned = data
                .roots
                .get(&root)
                .is_some_and(|entry| Arc::ptr_eq(&entry.election, election));
            if !owned {
                return;
            }
            let Some(entry) = data.roots.remove(&root) else {
                return;
            };
            for block in election.candidates() {
                if data.blocks.get(&block.hash()) == Some(&root) {
                    data.blocks.remove(&block.hash());
                }
            }
            if election.is_confirmed() {
                data.recently_confirmed.insert(root, election.winner().hash());
            }
            entry
        };

        let status = election.status();
        let mut cemented = false;
        if election.is_confirmed() {
            let winner = status.winner.clone();
            match self
                .confirmation
                .write_confirmation(&winner.account(), winner.height(), &winner.hash())
            {
                Ok(true) => {
                    self.stats.increment("active.confirmed");
                    cemented = true;
                }
                Ok(false) => {
                    self.stats.increment("active.confirmed_stale");
                    warn!(root = %root, hash = %winner.hash(), "winner is below the confirmation height, not reported");
                }
                Err(err) => {
                    self.stats.increment("active.confirmation_failed");
                    error!(root = %root, hash = %winner.hash(), error = %err, "failed to write confirmation");
                }
            }
        } else {
            self.stats.increment("active.expired");
        }

        if let Some(callback) = entry.erased_callback {
            callback(election);
        }
        self.notify(|o| o.on_active_stopped(&root));
        if cemented {
            self.notify(|o| o.on_confirmed(&status.winner, &status));
        }
        debug!(root = %root, status = ?status.status_type, "election removed");
    }

    fn notify(&self, event: impl Fn(&dyn ElectionObserver) -> Result<(), ObserverError>) {
        let observers = self.observers.read_locked().clone();
        for observer in observers {
            if let Err(err) = event(observer.as_ref()) {
                self.stats.increment("active.observer_failed");
                warn!(error = %err, "election observer failed");
            }
        }
    }
}

fn vote_code_stat(code: VoteCode) -> &'static str {
    match code {
        VoteCode::Vote => "vote.processed",
        VoteCode::Replay => "vote.replay",
        VoteCode::Indeterminate => "vote.indeterminate",
        VoteCode::Ignored => "vote.ignored",
    }
}

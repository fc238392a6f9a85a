//! Election schedulers: decide which blocks get an election next.
//!
//! - **Priority**: blocks pushed by block processing wait in the balance
//!   buckets. A dedicated thread pops them round robin and activates them
//!   through the priority limiter whenever it has a free slot.
//! - **Hinted**: blocks whose cached votes already carry a large share of
//!   the trended weight are activated through the hinted limiter, so the
//!   node joins elections the rest of the network is already running.
//! - **Optimistic**: accounts whose newest block is far ahead of their
//!   confirmation height get an election for that block, so confirming it
//!   cements the whole gap at once.

use lattice_types::{Account, Amount, Block, BlockHash, Timestamp};
use lattice_utils::{CondvarExt, MutexExt, StatsCounter};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, trace};

use crate::buckets::{Buckets, BucketsConfig};
use crate::limiter::Limiter;
use crate::online_reps::OnlineReps;
use crate::vote_cache::VoteCache;

struct PriorityState {
    stopped: bool,
    buckets: Buckets,
}

struct PriorityShared {
    state: Mutex<PriorityState>,
    condition: Condvar,
}

impl PriorityShared {
    fn notify(&self) {
        // Taking the lock orders this wakeup after the waiter's predicate check.
        drop(self.state.locked());
        self.condition.notify_all();
    }
}

pub struct PriorityScheduler {
    shared: Arc<PriorityShared>,
    limiter: Arc<Limiter>,
    stats: Arc<StatsCounter>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl PriorityScheduler {
    pub fn new(config: BucketsConfig, limiter: Arc<Limiter>, stats: Arc<StatsCounter>) -> Self {
        let shared = Arc::new(PriorityShared {
            state: Mutex::new(PriorityState {
                stopped: false,
                buckets: Buckets::new(config),
            }),
            condition: Condvar::new(),
        });
        let waker = shared.clone();
        limiter.set_vacancy_observer(move || waker.notify());
        Self {
            shared,
            limiter,
            stats,
            thread: Mutex::new(None),
        }
    }

    pub fn limiter(&self) -> &Arc<Limiter> {
        &self.limiter
    }

    /// Queue `block` for an election. `time` orders blocks inside a bucket
    /// (older first) and `priority` picks the bucket.
    pub fn push(&self, time: u64, block: Arc<Block>, priority: Amount) -> bool {
        let hash = block.hash();
        let added = self.shared.state.locked().buckets.push(time, block, priority);
        if added {
            self.stats.increment("scheduler.activated");
            trace!(hash = %hash, time, priority = %priority, "block queued");
            self.shared.notify();
        } else {
            self.stats.increment("scheduler.activate_full");
        }
        added
    }

    pub fn notify(&self) {
        self.shared.notify();
    }

    pub fn len(&self) -> usize {
        self.shared.state.locked().buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.locked().buckets.is_empty()
    }

    pub fn start(&self) -> io::Result<()> {
        let mut thread = self.thread.locked();
        if thread.is_some() {
            return Ok(());
        }
        let shared = self.shared.clone();
        let limiter = self.limiter.clone();
        let stats = self.stats.clone();
        *thread = Some(
            std::thread::Builder::new()
                .name("sched-priority".to_string())
                .spawn(move || run_priority(&shared, &limiter, &stats))?,
        );
        debug!("priority scheduler started");
        Ok(())
    }

    pub fn stop(&self) {
        self.shared.state.locked().stopped = true;
        self.shared.condition.notify_all();
        if let Some(handle) = self.thread.locked().take() {
            if handle.join().is_err() {
                error!("priority scheduler thread panicked");
            }
        }
    }
}

impl Drop for PriorityScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_priority(shared: &PriorityShared, limiter: &Limiter, stats: &StatsCounter) {
    let ready = |state: &PriorityState| limiter.available() && !state.buckets.is_empty();
    let mut state = shared.state.locked();
    while !state.stopped {
        state = shared
            .condition
            .wait_while_locked(state, |s| !s.stopped && !ready(&*s));
        if state.stopped {
            break;
        }
        stats.increment("scheduler.loop");
        let block = if ready(&*state) { state.buckets.pop() } else { None };
        drop(state);

        if let Some(block) = block {
            stats.increment("scheduler.insert_priority");
            match limiter.activate(block, Timestamp::now()) {
                (_, true) => stats.increment("scheduler.insert_priority_success"),
                (Some(_), false) => stats.increment("scheduler.insert_priority_joined"),
                (None, false) => {}
            }
        }
        state = shared.state.locked();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintedConfig {
    /// Cached tally needed for activation, in percent of trended weight.
    pub hinting_threshold_percent: u8,
    pub check_interval_secs: u64,
}

impl Default for HintedConfig {
    fn default() -> Self {
        Self {
            hinting_threshold_percent: 10,
            check_interval_secs: 1,
        }
    }
}

/// Looks up blocks by hash. Implemented by whoever stores received blocks.
pub trait BlockSource: Send + Sync {
    fn block(&self, hash: &BlockHash) -> Option<Arc<Block>>;
}

pub struct HintedScheduler {
    config: HintedConfig,
    limiter: Arc<Limiter>,
    vote_cache: Arc<Mutex<VoteCache>>,
    online_reps: Arc<OnlineReps>,
    blocks: Arc<dyn BlockSource>,
    stats: Arc<StatsCounter>,
}

impl HintedScheduler {
    pub fn new(
        config: HintedConfig,
        limiter: Arc<Limiter>,
        vote_cache: Arc<Mutex<VoteCache>>,
        online_reps: Arc<OnlineReps>,
        blocks: Arc<dyn BlockSource>,
        stats: Arc<StatsCounter>,
    ) -> Self {
        Self {
            config,
            limiter,
            vote_cache,
            online_reps,
            blocks,
            stats,
        }
    }

    pub fn config(&self) -> &HintedConfig {
        &self.config
    }

    pub fn tally_threshold(&self) -> Amount {
        self.online_reps
            .trended()
            .scale(u128::from(self.config.hinting_threshold_percent), 100)
    }

    /// Activate cached blocks above the threshold, heaviest first, until the
    /// hinted limiter is full. Returns the number of elections started.
    pub fn run_once(&self, now: Timestamp) -> usize {
        let threshold = self.tally_threshold();
        let candidates = self.vote_cache.locked().top(threshold, now);
        let active = self.limiter.active();

        let mut started = 0;
        for candidate in candidates {
            if !self.limiter.available() {
                break;
            }
            let hash = candidate.hash;
            if active.is_recently_confirmed(&hash) || active.election_for_block(&hash).is_some() {
                continue;
            }
            let Some(block) = self.blocks.block(&hash) else {
                self.stats.increment("hinted.missing_block");
                continue;
            };
            let (_, inserted) = self.limiter.activate(block, now);
            if inserted {
                self.stats.increment("hinted.insert");
                debug!(hash = %hash, tally = %candidate.tally, "hinted election started");
                started += 1;
            }
        }
        started
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimisticConfig {
    pub enabled: bool,
    /// Unconfirmed blocks an account needs beyond its confirmation height.
    pub gap_threshold: u64,
    /// Maximum number of queued accounts.
    pub max_size: usize,
    /// Time a candidate waits before activation, giving the priority
    /// scheduler a chance to handle the account first.
    pub activation_delay_secs: u64,
    pub check_interval_secs: u64,
}

impl Default for OptimisticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gap_threshold: 32,
            max_size: 1024,
            activation_delay_secs: 1,
            check_interval_secs: 1,
        }
    }
}

struct OptimisticCandidate {
    account: Account,
    queued: Timestamp,
}

#[derive(Default)]
struct OptimisticQueue {
    order: VecDeque<OptimisticCandidate>,
    /// Newest known block per queued account.
    heads: HashMap<Account, Arc<Block>>,
}

pub struct OptimisticScheduler {
    config: OptimisticConfig,
    limiter: Arc<Limiter>,
    queue: Mutex<OptimisticQueue>,
    stats: Arc<StatsCounter>,
}

impl OptimisticScheduler {
    pub fn new(config: OptimisticConfig, limiter: Arc<Limiter>, stats: Arc<StatsCounter>) -> Self {
        Self {
            config,
            limiter,
            queue: Mutex::new(OptimisticQueue::default()),
            stats,
        }
    }

    pub fn config(&self) -> &OptimisticConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.queue.locked().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `block`'s account if the block is more than `gap_threshold`
    /// blocks past `confirmed_height`.
    ///
    /// An account is queued once; a newer block for a queued account
    /// replaces its head and keeps its place. Returns whether the account
    /// was newly queued.
    pub fn activate(&self, block: Arc<Block>, confirmed_height: u64, now: Timestamp) -> bool {
        if !self.config.enabled {
            return false;
        }
        if block.height().saturating_sub(confirmed_height) <= self.config.gap_threshold {
            return false;
        }

        let account = block.account();
        let mut queue = self.queue.locked();
        if let Some(head) = queue.heads.get_mut(&account) {
            if block.height() > head.height() {
                *head = block;
            }
            return false;
        }
        if queue.order.len() >= self.config.max_size {
            self.stats.increment("optimistic.overfill");
            return false;
        }
        queue.heads.insert(account, block);
        queue.order.push_back(OptimisticCandidate { account, queued: now });
        self.stats.increment("optimistic.activated");
        trace!(account = %account, confirmed_height, "optimistic candidate queued");
        true
    }

    /// Start elections for candidates whose activation delay has passed,
    /// oldest first, until the optimistic limiter is full. Returns the
    /// number of elections started.
    pub fn run_once(&self, now: Timestamp) -> usize {
        let mut started = 0;
        while self.limiter.available() {
            let head = {
                let mut queue = self.queue.locked();
                let ready = queue
                    .order
                    .front()
                    .is_some_and(|c| c.queued.has_expired(self.config.activation_delay_secs, now));
                if !ready {
                    break;
                }
                let candidate = queue.order.pop_front();
                candidate.and_then(|c| queue.heads.remove(&c.account))
            };
            let Some(block) = head else {
                continue;
            };
            let active = self.limiter.active();
            if active.is_recently_confirmed(&block.hash()) {
                continue;
            }
            let (_, inserted) = self.limiter.activate(block.clone(), now);
            if inserted {
                self.stats.increment("optimistic.insert");
                debug!(account = %block.account(), height = block.height(), "optimistic election started");
                started += 1;
            } else {
                self.stats.increment("optimistic.insert_failed");
            }
        }
        started
    }
}

//! The node: owns every election component and the loops that drive them.
//!
//! Votes arrive through [`Node::deliver_vote`], blocks through
//! [`Node::notify_new_block`]. Background work runs on tokio tasks
//! (housekeeping tick, online weight sampling, hinted and optimistic
//! scheduling, metrics endpoint) plus the priority scheduler's own thread.

use lattice_consensus::{
    ActiveElections, ConfirmationWriter, Election, ElectionBehavior, ElectionObserver,
    ElectionStatus, HintedScheduler, LedgerCache, Limiter, ObserverError, OnlineReps,
    OptimisticScheduler, PriorityScheduler, RepWeights, TickSummary, VoteCache, VoteCode,
};
use lattice_nullables::{Clock, MemoryStore, SystemClock};
use lattice_store::Store;
use lattice_store_lmdb::LmdbEnvironment;
use lattice_types::{Account, Block, BlockHash, Timestamp, Vote};
use lattice_utils::{MutexExt, StatsCounter};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::block_index::BlockIndex;
use crate::config::{NodeConfig, StoreBackend};
use crate::metrics::{serve_metrics, GaugeSnapshot, NodeMetrics};
use crate::shutdown::{ShutdownController, StopReason};
use crate::NodeError;

/// Identifies the network connection a vote arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

/// Counts confirmations for prometheus.
struct MetricsObserver {
    metrics: Arc<NodeMetrics>,
}

impl ElectionObserver for MetricsObserver {
    fn on_confirmed(&self, _block: &Arc<Block>, _status: &ElectionStatus) -> Result<(), ObserverError> {
        self.metrics.elections_confirmed.inc();
        Ok(())
    }
}

pub struct Node {
    config: NodeConfig,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    stats: Arc<StatsCounter>,
    metrics: Arc<NodeMetrics>,
    shutdown: Arc<ShutdownController>,
    rep_weights: Arc<RepWeights>,
    online_reps: Arc<OnlineReps>,
    vote_cache: Arc<Mutex<VoteCache>>,
    active: Arc<ActiveElections>,
    limiters: BTreeMap<ElectionBehavior, Arc<Limiter>>,
    priority: Arc<PriorityScheduler>,
    hinted: Arc<HintedScheduler>,
    optimistic: Arc<OptimisticScheduler>,
    blocks: Arc<BlockIndex>,
    /// `active.expired` at the last metrics refresh.
    expired_seen: AtomicU64,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    /// Open the store selected by `config.store_backend` and build a node on it.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::Lmdb => Arc::new(LmdbEnvironment::open(
                &config.data_dir,
                config.lmdb_map_size,
            )?),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Self::new(config, store)
    }

    pub fn new(config: NodeConfig, store: Arc<dyn Store>) -> Result<Self, NodeError> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Build a node on `store`, reading time from `clock`.
    ///
    /// Loads rep weights and the cemented count, sanitizes the persisted
    /// online weight series and wires the election components together.
    /// Nothing runs until [`start`](Self::start).
    pub fn with_clock(
        config: NodeConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let now = clock.now();

        let (rep_weights, ledger_cache) = {
            let txn = store.tx_begin_read()?;
            (RepWeights::load(&*txn)?, LedgerCache::load(&*txn)?)
        };
        let rep_weights = Arc::new(rep_weights);
        let ledger_cache = Arc::new(ledger_cache);

        let online_reps = Arc::new(OnlineReps::new(
            config.online_reps_config(),
            rep_weights.clone(),
        ));
        online_reps.start(&*store, now)?;

        let stats = Arc::new(StatsCounter::new());
        let metrics = Arc::new(NodeMetrics::new()?);
        let vote_cache = Arc::new(Mutex::new(VoteCache::new(config.vote_cache_config())));

        let active = Arc::new(ActiveElections::new(
            config.active_elections_config(),
            rep_weights.clone(),
            online_reps.clone(),
            vote_cache.clone(),
            ConfirmationWriter::new(store.clone(), ledger_cache),
            stats.clone(),
        ));
        active.add_observer(Arc::new(MetricsObserver {
            metrics: metrics.clone(),
        }));

        let limiters: BTreeMap<_, _> = ElectionBehavior::ALL
            .iter()
            .map(|&behavior| {
                let limit = config.elections.limit(behavior);
                (behavior, Arc::new(Limiter::new(behavior, limit, active.clone())))
            })
            .collect();

        let priority = Arc::new(PriorityScheduler::new(
            config.buckets_config(),
            limiter_for(&limiters, ElectionBehavior::Priority)?,
            stats.clone(),
        ));

        let blocks = Arc::new(BlockIndex::new(config.block_index_size));
        let hinted = Arc::new(HintedScheduler::new(
            config.hinted_config(),
            limiter_for(&limiters, ElectionBehavior::Hinted)?,
            vote_cache.clone(),
            online_reps.clone(),
            blocks.clone(),
            stats.clone(),
        ));
        let optimistic = Arc::new(OptimisticScheduler::new(
            config.optimistic_config(),
            limiter_for(&limiters, ElectionBehavior::Optimistic)?,
            stats.clone(),
        ));

        info!(
            network = config.network.as_str(),
            reps = rep_weights.len(),
            total_weight = %rep_weights.total_weight(),
            cemented = active.confirmation().ledger_cache().cemented_count(),
            "node initialized"
        );

        Ok(Self {
            config,
            store,
            clock,
            stats,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            rep_weights,
            online_reps,
            vote_cache,
            active,
            limiters,
            priority,
            hinted,
            optimistic,
            blocks,
            expired_seen: AtomicU64::new(0),
            task_handles: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn stats(&self) -> &Arc<StatsCounter> {
        &self.stats
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &Arc<ShutdownController> {
        &self.shutdown
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

    pub fn active_elections(&self) -> &Arc<ActiveElections> {
        &self.active
    }

    pub fn limiter(&self, behavior: ElectionBehavior) -> Option<&Arc<Limiter>> {
        self.limiters.get(&behavior)
    }

    pub fn priority_scheduler(&self) -> &Arc<PriorityScheduler> {
        &self.priority
    }

    pub fn hinted_scheduler(&self) -> &Arc<HintedScheduler> {
        &self.hinted
    }

    pub fn optimistic_scheduler(&self) -> &Arc<OptimisticScheduler> {
        &self.optimistic
    }

    pub fn block_index(&self) -> &Arc<BlockIndex> {
        &self.blocks
    }

    pub fn add_observer(&self, observer: Arc<dyn ElectionObserver>) {
        self.active.add_observer(observer);
    }

    /// Route a vote received from the network.
    ///
    /// The signature is checked here; everything after that is a benign
    /// outcome reported per hash. Hashes without a running election are
    /// cached with the representative's current weight so a later election
    /// starts from them.
    pub fn deliver_vote(
        &self,
        vote: &Vote,
        channel: ChannelId,
    ) -> Result<HashMap<BlockHash, VoteCode>, NodeError> {
        self.metrics.votes_received.inc();
        if !lattice_crypto::verify_vote(vote) {
            self.stats.increment("node.vote_invalid");
            self.metrics.votes_invalid.inc();
            debug!(rep = %vote.account, %channel, "dropping vote with bad signature");
            return Err(NodeError::SignatureInvalid);
        }

        let now = self.clock.now();
        self.online_reps.observe(&vote.account, now);
        let results = self.active.vote(vote, now);

        let uncovered = results
            .values()
            .any(|code| *code == VoteCode::Indeterminate);
        if uncovered {
            let weight = self.rep_weights.representation_get(&vote.account);
            if weight.is_zero() {
                self.stats.increment("node.vote_cache_skip_weightless");
            } else {
                let outcome = self.vote_cache.locked().insert_filtered(vote, weight, now, |hash| {
                    results.get(hash) == Some(&VoteCode::Indeterminate)
                });
                trace!(
                    rep = %vote.account,
                    %channel,
                    inserted = outcome.inserted,
                    updated = outcome.updated,
                    "vote cached"
                );
            }
        }
        Ok(results)
    }

    /// A block was added to the ledger or received for a running election.
    ///
    /// Forks of a running election become candidates. Otherwise the block
    /// is queued for a priority election unless `account` is already
    /// confirmed at or above its height; an account far ahead of its
    /// confirmation height is also offered to the optimistic scheduler.
    /// Returns whether the block was accepted by the fork or priority path.
    pub fn notify_new_block(
        &self,
        block: Arc<Block>,
        account: &Account,
        time: u64,
    ) -> Result<bool, NodeError> {
        self.blocks.insert(block.clone());
        let now = self.clock.now();

        if self.active.is_active_root(&block.qualified_root()) {
            return Ok(self.active.publish(block, now));
        }

        let confirmed_height = self
            .active
            .confirmation()
            .confirmation_height(account)?
            .map_or(0, |info| info.height);
        if confirmed_height >= block.height() {
            self.stats.increment("node.block_already_confirmed");
            trace!(account = %account, hash = %block.hash(), "block already confirmed");
            return Ok(false);
        }

        self.optimistic.activate(block.clone(), confirmed_height, now);

        let priority = block.balance();
        Ok(self.priority.push(time, block, priority))
    }

    /// Start a manual election for `block`, bypassing the buckets.
    pub fn force_activate(&self, block: Arc<Block>) -> (Option<Arc<Election>>, bool) {
        self.blocks.insert(block.clone());
        let now = self.clock.now();
        match self.limiters.get(&ElectionBehavior::Manual) {
            Some(limiter) => limiter.activate(block, now),
            None => (None, false),
        }
    }

    /// One housekeeping pass: advance elections and refresh the gauges.
    pub fn housekeeping(&self) -> TickSummary {
        let now = self.clock.now();
        self.online_reps.trim(now);
        let summary = self.active.tick(now);
        self.refresh_metrics();
        if summary.finished > 0 || summary.requested > 0 {
            trace!(
                finished = summary.finished,
                requested = summary.requested,
                "housekeeping pass"
            );
        }
        summary
    }

    /// Persist an online weight sample and recompute the trend.
    pub fn sample_online_weight(&self) -> Result<(), NodeError> {
        let trended = self.online_reps.sample(&*self.store, self.clock.now())?;
        debug!(online = %self.online_reps.online(), trended = %trended, "online weight sampled");
        Ok(())
    }

    pub fn run_hinted(&self) -> usize {
        self.hinted.run_once(self.clock.now())
    }

    pub fn run_optimistic(&self) -> usize {
        self.optimistic.run_once(self.clock.now())
    }

    pub fn gauge_snapshot(&self) -> GaugeSnapshot {
        GaugeSnapshot {
            active_by_behavior: ElectionBehavior::ALL
                .iter()
                .map(|&b| (b, self.active.len_by_behavior(b)))
                .collect(),
            online_weight: self.online_reps.online(),
            trended_weight: self.online_reps.trended(),
            vote_cache_size: self.vote_cache.locked().len(),
            bucket_backlog: self.priority.len(),
        }
    }

    fn refresh_metrics(&self) {
        self.metrics.update(&self.gauge_snapshot());
        let expired = self.stats.get("active.expired");
        let previous = self.expired_seen.swap(expired, Ordering::Relaxed);
        self.metrics
            .elections_expired
            .inc_by(expired.saturating_sub(previous));
    }

    /// Start the priority scheduler thread and the background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) -> Result<(), NodeError> {
        info!(
            network = self.config.network.as_str(),
            data_dir = %self.config.data_dir.display(),
            "node starting"
        );
        self.priority.start()?;

        let mut handles = Vec::new();

        // ── Housekeeping ─────────────────────────────────────────────────────
        let node = Arc::clone(self);
        let mut stop = self.shutdown.subscribe();
        let period = Duration::from_millis(self.config.elections.tick_interval_ms);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.wait() => {
                        debug!("housekeeping task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        node.housekeeping();
                    }
                }
            }
        }));

        // ── Online weight sampling ───────────────────────────────────────────
        let node = Arc::clone(self);
        let mut stop = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.online_reps.sample_interval_secs);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The trend was computed at startup; skip the immediate tick.
            interval.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = stop.wait() => {
                        debug!("online weight sampling task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        if let Err(e) = node.sample_online_weight() {
                            warn!(error = %e, "failed to sample online weight");
                        }
                    }
                }
            }
        }));

        // ── Hinted scheduler ─────────────────────────────────────────────────
        let node = Arc::clone(self);
        let mut stop = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.hinted.check_interval_secs);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.wait() => {
                        debug!("hinted scheduler task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let started = node.run_hinted();
                        if started > 0 {
                            debug!(count = started, "hinted elections started");
                        }
                    }
                }
            }
        }));

        // ── Optimistic scheduler ─────────────────────────────────────────────
        if self.config.optimistic.enabled {
            let node = Arc::clone(self);
            let mut stop = self.shutdown.subscribe();
            let period = Duration::from_secs(self.config.optimistic.check_interval_secs);
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    tokio::select! {
                        biased;
                        _ = stop.wait() => {
                            debug!("optimistic scheduler task shutting down");
                            break;
                        }
                        _ = interval.tick() => {
                            let started = node.run_optimistic();
                            if started > 0 {
                                debug!(count = started, "optimistic elections started");
                            }
                        }
                    }
                }
            }));
        }

        // ── Metrics endpoint ─────────────────────────────────────────────────
        if self.config.enable_metrics {
            let metrics = Arc::clone(&self.metrics);
            let port = self.config.metrics_port;
            let stop = self.shutdown.subscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = serve_metrics(metrics, port, stop).await {
                    warn!(error = %e, port, "metrics endpoint stopped");
                }
            }));
        }

        self.task_handles.locked().extend(handles);
        Ok(())
    }

    /// Signal every background task and wait for it to finish.
    pub async fn stop(&self) {
        self.shutdown.stop(StopReason::Requested);
        self.priority.stop();

        let handles: Vec<_> = self.task_handles.locked().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        info!(
            cemented = self.active.confirmation().ledger_cache().cemented_count(),
            "node stopped"
        );
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

fn limiter_for(
    limiters: &BTreeMap<ElectionBehavior, Arc<Limiter>>,
    behavior: ElectionBehavior,
) -> Result<Arc<Limiter>, NodeError> {
    limiters
        .get(&behavior)
        .cloned()
        .ok_or_else(|| NodeError::Other(format!("no limiter for {behavior} elections")))
}

//! Election state machine.
//!
//! One election decides which of the competing blocks for a qualified root
//! gets confirmed. Representatives vote for a block; each vote is weighted by
//! the representative's current weight, and the election confirms once a
//! single block's tally reaches the quorum threshold from [`OnlineReps`].
//!
//! ```text
//!   Passive ──► Active ──► Confirmed
//!      │           │
//!      └───────────┴─────► Expired
//! ```
//!
//! Confirmed and Expired are terminal. Every transition into them is a
//! compare-and-set under the election mutex, so of two racing terminal
//! transitions exactly one wins and the other is a no-op.

use lattice_types::{Account, Amount, Block, BlockHash, QualifiedRoot, Timestamp, Vote};
use lattice_utils::MutexExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::online_reps::OnlineReps;
use crate::rep_weights::RepWeights;
use crate::vote_info::{VoteCode, VoteInfo, VoteSource};

/// Why an election was started. Each behavior has its own concurrency budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElectionBehavior {
    /// Picked from the balance buckets by the priority scheduler.
    Priority,
    /// Started because cached votes for the block carry a lot of weight.
    Hinted,
    Optimistic,
    /// Requested explicitly by an operator or test.
    Manual,
}

impl ElectionBehavior {
    pub const ALL: [ElectionBehavior; 4] = [
        ElectionBehavior::Priority,
        ElectionBehavior::Hinted,
        ElectionBehavior::Optimistic,
        ElectionBehavior::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElectionBehavior::Priority => "priority",
            ElectionBehavior::Hinted => "hinted",
            ElectionBehavior::Optimistic => "optimistic",
            ElectionBehavior::Manual => "manual",
        }
    }
}

impl fmt::Display for ElectionBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionState {
    /// Created, only listening for votes.
    Passive,
    /// Soliciting confirmations from representatives.
    Active,
    Confirmed,
    Expired,
}

impl ElectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ElectionState::Confirmed | ElectionState::Expired)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionStatusType {
    Ongoing,
    /// A block reached the quorum threshold.
    ConfirmedQuorum,
    /// Confirmed through [`Election::force_confirm`].
    ConfirmedForced,
    Expired,
}

/// Snapshot of an election's outcome.
#[derive(Clone, Debug)]
pub struct ElectionStatus {
    pub winner: Arc<Block>,
    pub tally: Amount,
    /// Weight of final votes for the winner.
    pub final_tally: Amount,
    pub block_count: usize,
    pub voter_count: usize,
    pub confirmation_request_count: u32,
    pub election_end: Option<Timestamp>,
    pub election_duration_secs: u64,
    pub status_type: ElectionStatusType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectionConfig {
    /// Maximum number of competing blocks tracked.
    pub max_blocks: usize,
    /// Time spent passive before confirmation requests start.
    pub passive_secs: u64,
    /// Time to live; a running election older than this expires.
    pub ttl_secs: u64,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            max_blocks: 10,
            passive_secs: 5,
            ttl_secs: 5 * 60,
        }
    }
}

struct ElectionData {
    state: ElectionState,
    state_changed: Timestamp,
    last_votes: HashMap<Account, VoteInfo>,
    /// Candidates in arrival order.
    last_blocks: Vec<Arc<Block>>,
    status: ElectionStatus,
    last_request: Option<Timestamp>,
}

impl ElectionData {
    fn block(&self, hash: &BlockHash) -> Option<&Arc<Block>> {
        self.last_blocks.iter().find(|b| b.hash() == *hash)
    }

    /// Per-candidate tally and final tally. Votes for blocks that are not
    /// candidates are kept but not counted.
    fn tallies(
        &self,
        rep_weights: &RepWeights,
    ) -> (HashMap<BlockHash, Amount>, HashMap<BlockHash, Amount>) {
        let mut tally: HashMap<BlockHash, Amount> =
            self.last_blocks.iter().map(|b| (b.hash(), Amount::ZERO)).collect();
        let mut final_tally = HashMap::new();
        for (rep, info) in &self.last_votes {
            let Some(sum) = tally.get_mut(&info.hash) else {
                continue;
            };
            let weight = rep_weights.representation_get(rep);
            *sum = sum.saturating_add(weight);
            if info.is_final() {
                let f: &mut Amount = final_tally.entry(info.hash).or_default();
                *f = f.saturating_add(weight);
            }
        }
        (tally, final_tally)
    }

    fn set_state(&mut self, state: ElectionState, now: Timestamp) {
        self.state = state;
        self.state_changed = now;
    }
}

pub struct Election {
    root: QualifiedRoot,
    behavior: ElectionBehavior,
    config: ElectionConfig,
    started: Timestamp,
    rep_weights: Arc<RepWeights>,
    online_reps: Arc<OnlineReps>,
    data: Mutex<ElectionData>,
}

impl Election {
    pub fn new(
        block: Arc<Block>,
        behavior: ElectionBehavior,
        config: ElectionConfig,
        rep_weights: Arc<RepWeights>,
        online_reps: Arc<OnlineReps>,
        now: Timestamp,
    ) -> Self {
        let status = ElectionStatus {
            winner: block.clone(),
            tally: Amount::ZERO,
            final_tally: Amount::ZERO,
            block_count: 1,
            voter_count: 0,
            confirmation_request_count: 0,
            election_end: None,
            election_duration_secs: 0,
            status_type: ElectionStatusType::Ongoing,
        };
        Self {
            root: block.qualified_root(),
            behavior,
            config,
            started: now,
            rep_weights,
            online_reps,
            data: Mutex::new(ElectionData {
                state: ElectionState::Passive,
                state_changed: now,
                last_votes: HashMap::new(),
                last_blocks: vec![block],
                status,
                last_request: None,
            }),
        }
    }

    pub fn root(&self) -> &QualifiedRoot {
        &self.root
    }

    pub fn behavior(&self) -> ElectionBehavior {
        self.behavior
    }

    pub fn started(&self) -> Timestamp {
        self.started
    }

    pub fn state(&self) -> ElectionState {
        self.data.locked().state
    }

    pub fn state_changed(&self) -> Timestamp {
        self.data.locked().state_changed
    }

    pub fn is_confirmed(&self) -> bool {
        self.state() == ElectionState::Confirmed
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Apply a representative's vote for `hash`.
    ///
    /// Only a timestamp strictly newer than the one already recorded for
    /// `rep` replaces it, so a final vote can never be replaced. A live
    /// non-final vote arriving within the representative's cooldown of its
    /// previous vote is ignored. The vote is recorded even when `hash` is
    /// not a candidate yet; it counts as soon as the block is inserted.
    pub fn vote(
        &self,
        rep: &Account,
        timestamp: u64,
        hash: &BlockHash,
        source: VoteSource,
        now: Timestamp,
    ) -> VoteCode {
        let mut data = self.data.locked();
        if data.state.is_terminal() {
            return VoteCode::Ignored;
        }
        if let Some(last) = data.last_votes.get(rep) {
            if last.timestamp >= timestamp {
                return VoteCode::Replay;
            }
            if source == VoteSource::Live && timestamp != Vote::FINAL_TIMESTAMP {
                let cooldown = self.cooldown_secs(self.rep_weights.representation_get(rep));
                if !last.received.has_expired(cooldown, now) {
                    trace!(root = %self.root, rep = %rep, cooldown, "vote within cooldown");
                    return VoteCode::Ignored;
                }
            }
        }

        data.last_votes
            .insert(*rep, VoteInfo::new(timestamp, *hash, now));
        trace!(root = %self.root, rep = %rep, hash = %hash, timestamp, ?source, "vote recorded");

        self.confirm_if_quorum(&mut data, now);
        VoteCode::Vote
    }

    /// Add a competing block for this root.
    ///
    /// Rejected once the election is terminal, for a block of another root,
    /// for a duplicate, and when `max_blocks` candidates are already tracked.
    pub fn insert_candidate(&self, block: Arc<Block>, now: Timestamp) -> bool {
        if block.qualified_root() != self.root {
            return false;
        }
        let mut data = self.data.locked();
        if data.state.is_terminal()
            || data.block(&block.hash()).is_some()
            || data.last_blocks.len() >= self.config.max_blocks
        {
            return false;
        }
        debug!(root = %self.root, hash = %block.hash(), "fork candidate added");
        data.last_blocks.push(block);
        data.status.block_count = data.last_blocks.len();
        self.confirm_if_quorum(&mut data, now);
        true
    }

    /// Confirm the current winner regardless of its tally.
    ///
    /// Returns `false` if the election was already terminal.
    pub fn force_confirm(&self, now: Timestamp) -> bool {
        let mut data = self.data.locked();
        if data.state.is_terminal() {
            return false;
        }
        self.refresh_status(&mut data);
        self.finish(&mut data, ElectionState::Confirmed, ElectionStatusType::ConfirmedForced, now);
        true
    }

    /// Stop the election without a winner.
    ///
    /// Returns `false` if the election was already terminal.
    pub fn expire(&self, now: Timestamp) -> bool {
        let mut data = self.data.locked();
        if data.state.is_terminal() {
            return false;
        }
        self.finish(&mut data, ElectionState::Expired, ElectionStatusType::Expired, now);
        true
    }

    /// Advance time-driven transitions. Returns `true` once the election is
    /// terminal.
    pub fn transition_time(&self, now: Timestamp) -> bool {
        let mut data = self.data.locked();
        match data.state {
            ElectionState::Confirmed | ElectionState::Expired => return true,
            ElectionState::Passive if data.state_changed.has_expired(self.config.passive_secs, now) => {
                data.set_state(ElectionState::Active, now);
                trace!(root = %self.root, "election active");
            }
            _ => {}
        }
        if self.started.has_expired(self.config.ttl_secs, now) {
            self.finish(&mut data, ElectionState::Expired, ElectionStatusType::Expired, now);
            return true;
        }
        false
    }

    /// Whether a confirmation request is due. A `true` result counts as a
    /// request sent at `now`.
    pub fn should_request_confirmation(&self, now: Timestamp, interval_secs: u64) -> bool {
        let mut data = self.data.locked();
        if data.state != ElectionState::Active {
            return false;
        }
        let due = data
            .last_request
            .map_or(true, |last| last.has_expired(interval_secs, now));
        if due {
            data.last_request = Some(now);
            data.status.confirmation_request_count += 1;
        }
        due
    }

    pub fn confirmation_request_count(&self) -> u32 {
        self.data.locked().status.confirmation_request_count
    }

    pub fn winner(&self) -> Arc<Block> {
        self.data.locked().status.winner.clone()
    }

    /// Current winner and its tally.
    pub fn leading_block(&self) -> (BlockHash, Amount) {
        let data = self.data.locked();
        let (tally, _) = data.tallies(&self.rep_weights);
        let hash = data.status.winner.hash();
        (hash, tally.get(&hash).copied().unwrap_or_default())
    }

    pub fn status(&self) -> ElectionStatus {
        self.data.locked().status.clone()
    }

    /// Weighted tally of every candidate.
    pub fn tally(&self) -> HashMap<BlockHash, Amount> {
        self.data.locked().tallies(&self.rep_weights).0
    }

    /// Weight of final votes per candidate. Candidates without final votes are absent.
    pub fn final_tally(&self) -> HashMap<BlockHash, Amount> {
        self.data.locked().tallies(&self.rep_weights).1
    }

    /// Latest vote of every representative that voted.
    pub fn votes(&self) -> HashMap<Account, VoteInfo> {
        self.data.locked().last_votes.clone()
    }

    pub fn candidates(&self) -> Vec<Arc<Block>> {
        self.data.locked().last_blocks.clone()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.data.locked().block(hash).is_some()
    }

    pub fn block(&self, hash: &BlockHash) -> Option<Arc<Block>> {
        self.data.locked().block(hash).cloned()
    }

    /// Seconds a representative must wait between live votes. Heavier
    /// representatives, relative to trended weight, may revote sooner.
    fn cooldown_secs(&self, weight: Amount) -> u64 {
        let trended = self.online_reps.trended();
        if weight > trended.scale(1, 20) {
            1
        } else if weight > trended.scale(1, 100) {
            5
        } else {
            15
        }
    }

    /// Recompute the winner and confirm it if its tally reaches the quorum
    /// threshold.
    fn confirm_if_quorum(&self, data: &mut ElectionData, now: Timestamp) {
        self.refresh_status(data);
        let tally = data.status.tally;
        if tally.is_zero() {
            return;
        }
        let delta = self.online_reps.delta();
        if tally >= delta {
            debug!(
                root = %self.root,
                winner = %data.status.winner.hash(),
                tally = %tally,
                delta = %delta,
                "quorum reached"
            );
            self.finish(data, ElectionState::Confirmed, ElectionStatusType::ConfirmedQuorum, now);
        }
    }

    /// Pick the winner: the highest tally wins, and on a tie the current
    /// winner keeps the title, then the earliest inserted candidate.
    fn refresh_status(&self, data: &mut ElectionData) {
        let (tally, final_tally) = data.tallies(&self.rep_weights);
        let current = data.status.winner.hash();
        let current_tally = tally.get(&current).copied().unwrap_or_default();
        let best = tally.values().copied().max().unwrap_or_default();

        if current_tally < best {
            if let Some(block) = data
                .last_blocks
                .iter()
                .find(|b| tally.get(&b.hash()).copied() == Some(best))
            {
                data.status.winner = block.clone();
            }
        }

        let winner = data.status.winner.hash();
        data.status.tally = tally.get(&winner).copied().unwrap_or_default();
        data.status.final_tally = final_tally.get(&winner).copied().unwrap_or_default();
        data.status.block_count = data.last_blocks.len();
        data.status.voter_count = data.last_votes.len();
    }

    fn finish(
        &self,
        data: &mut ElectionData,
        state: ElectionState,
        status_type: ElectionStatusType,
        now: Timestamp,
    ) {
        data.set_state(state, now);
        data.status.status_type = status_type;
        data.status.election_end = Some(now);
        data.status.election_duration_secs = self.started.elapsed_since(now);
        debug!(
            root = %self.root,
            behavior = %self.behavior,
            ?status_type,
            duration_secs = data.status.election_duration_secs,
            "election finished"
        );
    }
}

impl fmt::Debug for Election {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Election")
            .field("root", &self.root)
            .field("behavior", &self.behavior)
            .field("state", &self.state())
            .finish()
    }
}

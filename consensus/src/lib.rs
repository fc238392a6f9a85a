//! Election core: weighted vote tallying and admission control.
//!
//! Representatives vote on competing blocks for a qualified root. A block is
//! confirmed once the weight behind it reaches the quorum threshold derived
//! from trended online weight.
//!
//! ## Module overview
//!
//! - [`election`]: state machine and tally for one qualified root.
//! - [`active_elections`]: registry of running elections, vote routing and completion.
//! - [`limiter`]: per-behavior concurrency budgets.
//! - [`buckets`] / [`scheduler`]: which blocks get an election next.
//! - [`vote_cache`]: votes for blocks without an election.
//! - [`rep_weights`] / [`online_reps`]: voting weight and the quorum threshold.
//! - [`confirmation`]: confirmation height writes.
//! - [`observer`]: lifecycle notifications.

pub mod active_elections;
pub mod buckets;
pub mod confirmation;
pub mod election;
pub mod error;
pub mod limiter;
pub mod observer;
pub mod online_reps;
pub mod recently_confirmed;
pub mod rep_weights;
pub mod scheduler;
pub mod vote_cache;
pub mod vote_info;

pub use active_elections::{ActiveElections, ActiveElectionsConfig, ErasedCallback, TickSummary};
pub use buckets::{Buckets, BucketsConfig};
pub use confirmation::{ConfirmationWriter, LedgerCache};
pub use election::{
    Election, ElectionBehavior, ElectionConfig, ElectionState, ElectionStatus, ElectionStatusType,
};
pub use error::ConsensusError;
pub use limiter::Limiter;
pub use observer::{ElectionObserver, ObserverError};
pub use online_reps::{OnlineReps, OnlineRepsConfig, DEFAULT_QUORUM_PERCENTAGE};
pub use recently_confirmed::RecentlyConfirmed;
pub use rep_weights::{RepWeights, WeightChange};
pub use scheduler::{
    BlockSource, HintedConfig, HintedScheduler, OptimisticConfig, OptimisticScheduler,
    PriorityScheduler,
};
pub use vote_cache::{CacheEntry, CachedVote, InsertOutcome, TopEntry, VoteCache, VoteCacheConfig};
pub use vote_info::{VoteCode, VoteInfo, VoteSource};

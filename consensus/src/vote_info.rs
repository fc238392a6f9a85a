//! Per-representative vote records and vote processing outcomes.

use lattice_types::{BlockHash, Timestamp, Vote};
use serde::{Deserialize, Serialize};

/// Outcome of applying a vote to an election.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoteCode {
    /// Recorded; the representative's latest vote changed.
    Vote,
    /// Not newer than the vote already recorded for this representative.
    Replay,
    /// No live election covers this hash.
    Indeterminate,
    /// Dropped without effect: the election is terminal, the hash won a
    /// recently confirmed election, or the representative is still in its
    /// live vote cooldown.
    Ignored,
}

impl VoteCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteCode::Vote => "vote",
            VoteCode::Replay => "replay",
            VoteCode::Indeterminate => "indeterminate",
            VoteCode::Ignored => "ignored",
        }
    }
}

/// Where a vote came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteSource {
    /// Received from the network.
    Live,
    /// Replayed from the vote cache when the election started.
    Cache,
}

/// The latest vote recorded for one representative in one election.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    /// Vote timestamp as signed by the representative.
    pub timestamp: u64,
    /// Block the representative endorses.
    pub hash: BlockHash,
    /// Local arrival time.
    pub received: Timestamp,
}

impl VoteInfo {
    pub fn new(timestamp: u64, hash: BlockHash, received: Timestamp) -> Self {
        Self {
            timestamp,
            hash,
            received,
        }
    }

    pub fn is_final(&self) -> bool {
        self.timestamp == Vote::FINAL_TIMESTAMP
    }
}

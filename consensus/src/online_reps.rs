//! Online representative tracking and the quorum threshold.
//!
//! A representative counts as online while it has voted within the last
//! `weight_period`. The quorum threshold is not computed from the
//! instantaneous online stake but from a trend: the median of a persisted
//! series of periodic samples, so short-lived spikes or dips in observed
//! weight do not move it.

use lattice_store::{OnlineWeightStore, OnlineWeightWrite, Store};
use lattice_types::{Account, Amount, Network, Timestamp};
use lattice_utils::MutexExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::rep_weights::RepWeights;
use crate::ConsensusError;

pub const DEFAULT_QUORUM_PERCENTAGE: u8 = 67;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnlineRepsConfig {
    /// Share of trended weight required to confirm, in percent.
    pub quorum_percentage: u8,
    /// Floor for the trended weight.
    pub online_weight_minimum: Amount,
    /// Representatives at or below this weight are never counted as online.
    pub representative_vote_weight_minimum: Amount,
    /// How long a vote keeps a representative online, and the sampling period.
    pub weight_period_secs: u64,
    /// Number of persisted samples the trend is computed over.
    pub max_samples: usize,
}

impl OnlineRepsConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            online_weight_minimum: network.online_weight_minimum(),
            representative_vote_weight_minimum: network.representative_vote_weight_minimum(),
            ..Self::default()
        }
    }
}

impl Default for OnlineRepsConfig {
    fn default() -> Self {
        Self {
            quorum_percentage: DEFAULT_QUORUM_PERCENTAGE,
            online_weight_minimum: Network::Live.online_weight_minimum(),
            representative_vote_weight_minimum: Network::Live.representative_vote_weight_minimum(),
            weight_period_secs: 5 * 60,
            max_samples: 4032,
        }
    }
}

#[derive(Default)]
struct OnlineRepsData {
    /// Representative → last time it was observed.
    reps: HashMap<Account, Timestamp>,
    /// Median of the persisted samples.
    trended: Amount,
}

impl OnlineRepsData {
    fn trim(&mut self, now: Timestamp, period: u64) {
        let cutoff = now.saturating_sub_secs(period);
        self.reps.retain(|_, seen| *seen >= cutoff);
    }
}

pub struct OnlineReps {
    config: OnlineRepsConfig,
    rep_weights: Arc<RepWeights>,
    data: Mutex<OnlineRepsData>,
}

impl OnlineReps {
    pub fn new(config: OnlineRepsConfig, rep_weights: Arc<RepWeights>) -> Self {
        Self {
            config,
            rep_weights,
            data: Mutex::new(OnlineRepsData::default()),
        }
    }

    pub fn config(&self) -> &OnlineRepsConfig {
        &self.config
    }

    /// Mark `rep` as online. Returns `true` if it was not online before.
    pub fn observe(&self, rep: &Account, now: Timestamp) -> bool {
        let weight = self.rep_weights.representation_get(rep);
        if weight <= self.config.representative_vote_weight_minimum {
            return false;
        }
        let mut data = self.data.locked();
        let new_rep = data.reps.insert(*rep, now).is_none();
        data.trim(now, self.config.weight_period_secs);
        if new_rep {
            debug!(rep = %rep, weight = %weight, "representative online");
        }
        new_rep
    }

    /// Drop representatives not seen within the weight period.
    pub fn trim(&self, now: Timestamp) {
        self.data.locked().trim(now, self.config.weight_period_secs);
    }

    /// Sum of current weights of the online representatives.
    pub fn online(&self) -> Amount {
        let reps: Vec<Account> = self.data.locked().reps.keys().copied().collect();
        reps.iter()
            .map(|rep| self.rep_weights.representation_get(rep))
            .sum()
    }

    /// Trended online weight, never below `online_weight_minimum`.
    pub fn trended(&self) -> Amount {
        self.data
            .locked()
            .trended
            .max(self.config.online_weight_minimum)
    }

    /// Quorum threshold every election compares tallies against.
    pub fn delta(&self) -> Amount {
        self.trended()
            .scale(u128::from(self.config.quorum_percentage), 100)
    }

    pub fn list(&self) -> Vec<Account> {
        self.data.locked().reps.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.data.locked().reps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.data.locked().reps.clear();
    }

    /// Sanitize the persisted series and compute the initial trend.
    ///
    /// Samples older than the full trend window or later than `now` are
    /// deleted; they come from a stopped node or a skewed clock.
    pub fn start(&self, store: &dyn Store, now: Timestamp) -> Result<Amount, ConsensusError> {
        let window = self
            .config
            .weight_period_secs
            .saturating_mul(self.config.max_samples as u64);
        let cutoff = now.saturating_sub_secs(window);

        let mut txn = store.tx_begin_write()?;
        let mut removed = 0usize;
        for (time, _) in txn.online_weight_samples()? {
            if time < cutoff || time > now {
                txn.delete_online_weight(time)?;
                removed += 1;
            }
        }
        let trend = median(&txn.online_weight_samples()?);
        txn.commit()?;

        self.data.locked().trended = trend;
        info!(removed, trended = %self.trended(), "online weight trend loaded");
        Ok(trend)
    }

    /// Persist the current online weight and recompute the trend.
    ///
    /// Runs once per weight period. Returns the new trended weight.
    pub fn sample(&self, store: &dyn Store, now: Timestamp) -> Result<Amount, ConsensusError> {
        self.trim(now);
        let online = self.online();

        let mut txn = store.tx_begin_write()?;
        txn.put_online_weight(now, online)?;
        let mut samples = txn.online_weight_samples()?;
        let excess = samples.len().saturating_sub(self.config.max_samples);
        for (time, _) in samples.drain(..excess) {
            txn.delete_online_weight(time)?;
        }
        let trend = median(&samples);
        txn.commit()?;

        self.data.locked().trended = trend;
        debug!(online = %online, trend = %trend, samples = samples.len(), "online weight sampled");
        Ok(self.trended())
    }
}

/// Median of the sample weights; upper median for an even count.
fn median(samples: &[(Timestamp, Amount)]) -> Amount {
    let mut weights: Vec<Amount> = samples.iter().map(|(_, w)| *w).collect();
    if weights.is_empty() {
        return Amount::ZERO;
    }
    weights.sort_unstable();
    weights[weights.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_nullables::MemoryStore;
    use lattice_store::OnlineWeightStore;

    fn rep(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    fn config(minimum: u128) -> OnlineRepsConfig {
        OnlineRepsConfig {
            quorum_percentage: 67,
            online_weight_minimum: Amount::raw(minimum),
            representative_vote_weight_minimum: Amount::raw(1),
            weight_period_secs: 300,
            max_samples: 4,
        }
    }

    fn online_reps(minimum: u128, weights: &[(u8, u128)]) -> OnlineReps {
        let weights = RepWeights::from_weights(
            weights.iter().map(|(r, w)| (rep(*r), Amount::raw(*w))),
        );
        OnlineReps::new(config(minimum), Arc::new(weights))
    }

    #[test]
    fn observe_counts_weight_once() {
        let reps = online_reps(0, &[(1, 100), (2, 50)]);
        assert!(reps.observe(&rep(1), Timestamp::new(10)));
        assert!(!reps.observe(&rep(1), Timestamp::new(11)));
        assert!(reps.observe(&rep(2), Timestamp::new(12)));
        assert_eq!(reps.online(), Amount::raw(150));
        assert_eq!(reps.len(), 2);
    }

    #[test]
    fn light_reps_are_not_observed() {
        let reps = online_reps(0, &[(1, 1)]);
        assert!(!reps.observe(&rep(1), Timestamp::new(10)));
        assert!(!reps.observe(&rep(9), Timestamp::new(10)));
        assert!(reps.is_empty());
    }

    #[test]
    fn reps_go_offline_after_weight_period() {
        let reps = online_reps(0, &[(1, 100), (2, 50)]);
        reps.observe(&rep(1), Timestamp::new(0));
        reps.observe(&rep(2), Timestamp::new(200));
        reps.trim(Timestamp::new(301));
        assert_eq!(reps.list(), vec![rep(2)]);
        assert_eq!(reps.online(), Amount::raw(50));
    }

    #[test]
    fn delta_uses_minimum_before_any_sample() {
        let reps = online_reps(1000, &[]);
        assert_eq!(reps.trended(), Amount::raw(1000));
        assert_eq!(reps.delta(), Amount::raw(670));
    }

    #[test]
    fn sample_trend_is_median() {
        let store = MemoryStore::new();
        let reps = online_reps(0, &[(1, 100), (2, 900)]);

        reps.observe(&rep(1), Timestamp::new(1));
        reps.sample(&store, Timestamp::new(1)).unwrap();
        reps.sample(&store, Timestamp::new(2)).unwrap();

        // A single spike does not move the median of three samples.
        reps.observe(&rep(2), Timestamp::new(3));
        let trended = reps.sample(&store, Timestamp::new(3)).unwrap();
        assert_eq!(trended, Amount::raw(100));
        assert_eq!(reps.delta(), Amount::raw(67));
    }

    #[test]
    fn sample_keeps_at_most_max_samples() {
        let store = MemoryStore::new();
        let reps = online_reps(0, &[(1, 100)]);
        reps.observe(&rep(1), Timestamp::new(1));
        for t in 1..=6 {
            reps.sample(&store, Timestamp::new(t)).unwrap();
        }
        let samples = store.tx_begin_read().unwrap().online_weight_samples().unwrap();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].0, Timestamp::new(3));
    }

    #[test]
    fn start_discards_stale_and_future_samples() {
        let store = MemoryStore::new();
        {
            let mut txn = store.tx_begin_write().unwrap();
            txn.put_online_weight(Timestamp::new(1), Amount::raw(5)).unwrap();
            txn.put_online_weight(Timestamp::new(9_000), Amount::raw(70)).unwrap();
            txn.put_online_weight(Timestamp::new(9_500), Amount::raw(80)).unwrap();
            txn.put_online_weight(Timestamp::new(20_000), Amount::raw(1)).unwrap();
            txn.commit().unwrap();
        }
        let reps = online_reps(0, &[]);
        // window = 4 samples * 300s
        let trend = reps.start(&store, Timestamp::new(10_000)).unwrap();
        assert_eq!(trend, Amount::raw(80));

        let remaining: Vec<u64> = store
            .tx_begin_read()
            .unwrap()
            .online_weight_samples()
            .unwrap()
            .iter()
            .map(|(t, _)| t.as_secs())
            .collect();
        assert_eq!(remaining, vec![9_000, 9_500]);
    }

    #[test]
    fn clear_forgets_everyone() {
        let reps = online_reps(0, &[(1, 100)]);
        reps.observe(&rep(1), Timestamp::new(1));
        reps.clear();
        assert_eq!(reps.online(), Amount::ZERO);
    }
}

//! Node configuration with TOML file support.

use lattice_consensus::{
    ActiveElectionsConfig, BucketsConfig, ElectionBehavior, HintedConfig, OnlineRepsConfig,
    OptimisticConfig, VoteCacheConfig, DEFAULT_QUORUM_PERCENTAGE,
};
use lattice_types::{Amount, Network};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::logging::LogFormat;
use crate::NodeError;

/// Where the node keeps confirmation heights, rep weights and online
/// weight samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Lmdb,
    /// Nothing survives a restart. Useful for tests and throwaway dev nodes.
    Memory,
}

/// Configuration for a node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub network: Network,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub store_backend: StoreBackend,

    /// LMDB memory map size in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Blocks remembered for hinted activation.
    #[serde(default = "default_block_index_size")]
    pub block_index_size: usize,

    #[serde(default)]
    pub elections: ElectionsSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub vote_cache: VoteCacheSection,

    #[serde(default)]
    pub online_reps: OnlineRepsSection,

    #[serde(default)]
    pub hinted: HintedSection,

    #[serde(default)]
    pub optimistic: OptimisticSection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionsSection {
    pub priority_limit: usize,
    pub hinted_limit: usize,
    pub optimistic_limit: usize,
    pub manual_limit: usize,
    pub election_expiry_secs: u64,
    /// Time to live of hinted and optimistic elections.
    pub short_election_expiry_secs: u64,
    pub max_blocks_per_election: usize,
    pub passive_secs: u64,
    pub confirmation_request_interval_secs: u64,
    pub recently_confirmed_size: usize,
    pub tick_interval_ms: u64,
}

impl Default for ElectionsSection {
    fn default() -> Self {
        let active = ActiveElectionsConfig::default();
        Self {
            priority_limit: 150,
            hinted_limit: 20,
            optimistic_limit: 10,
            manual_limit: 50,
            election_expiry_secs: active.election_expiry_secs,
            short_election_expiry_secs: active.short_election_expiry_secs,
            max_blocks_per_election: active.max_blocks_per_election,
            passive_secs: active.passive_secs,
            confirmation_request_interval_secs: active.confirmation_request_interval_secs,
            recently_confirmed_size: active.recently_confirmed_size,
            tick_interval_ms: 500,
        }
    }
}

impl ElectionsSection {
    pub fn limit(&self, behavior: ElectionBehavior) -> usize {
        match behavior {
            ElectionBehavior::Priority => self.priority_limit,
            ElectionBehavior::Hinted => self.hinted_limit,
            ElectionBehavior::Optimistic => self.optimistic_limit,
            ElectionBehavior::Manual => self.manual_limit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    /// Total backlog capacity, divided evenly across the buckets.
    pub bucket_max_blocks: usize,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            bucket_max_blocks: BucketsConfig::default().max_blocks,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteCacheSection {
    pub max_size: usize,
    pub max_voters: usize,
    pub age_cutoff_secs: u64,
}

impl Default for VoteCacheSection {
    fn default() -> Self {
        let cache = VoteCacheConfig::default();
        Self {
            max_size: cache.max_size,
            max_voters: cache.max_voters,
            age_cutoff_secs: cache.age_cutoff_secs,
        }
    }
}

/// Weights are whole nano; TOML integers cannot carry raw amounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlineRepsSection {
    pub quorum_percentage: u8,
    /// Floor for the trended weight. Unset means the network's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_weight_minimum_nano: Option<u64>,
    /// Unset means the network's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub representative_vote_weight_minimum_nano: Option<u64>,
    pub weight_period_secs: u64,
    pub max_samples: usize,
    pub sample_interval_secs: u64,
}

impl Default for OnlineRepsSection {
    fn default() -> Self {
        let reps = OnlineRepsConfig::default();
        Self {
            quorum_percentage: DEFAULT_QUORUM_PERCENTAGE,
            online_weight_minimum_nano: None,
            representative_vote_weight_minimum_nano: None,
            weight_period_secs: reps.weight_period_secs,
            max_samples: reps.max_samples,
            sample_interval_secs: reps.weight_period_secs,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintedSection {
    pub hinting_threshold_percent: u8,
    pub check_interval_secs: u64,
}

impl Default for HintedSection {
    fn default() -> Self {
        let hinted = HintedConfig::default();
        Self {
            hinting_threshold_percent: hinted.hinting_threshold_percent,
            check_interval_secs: hinted.check_interval_secs,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimisticSection {
    pub enabled: bool,
    pub gap_threshold: u64,
    pub max_size: usize,
    pub activation_delay_secs: u64,
    pub check_interval_secs: u64,
}

impl Default for OptimisticSection {
    fn default() -> Self {
        let optimistic = OptimisticConfig::default();
        Self {
            enabled: optimistic.enabled,
            gap_threshold: optimistic.gap_threshold,
            max_size: optimistic.max_size,
            activation_delay_secs: optimistic.activation_delay_secs,
            check_interval_secs: optimistic.check_interval_secs,
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./lattice_data")
}

fn default_lmdb_map_size() -> usize {
    lattice_store_lmdb::environment::DEFAULT_MAP_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9091
}

fn default_block_index_size() -> usize {
    65536
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Defaults for `network`, with the network's weight floors.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject values the election core cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        let quorum = self.online_reps.quorum_percentage;
        if quorum == 0 || quorum > 100 {
            return Err(NodeError::Config(format!(
                "online_reps.quorum_percentage must be in 1..=100, got {quorum}"
            )));
        }
        if self.online_reps.max_samples == 0 {
            return Err(NodeError::Config("online_reps.max_samples must be positive".into()));
        }
        if self.online_reps.sample_interval_secs == 0
            || self.hinted.check_interval_secs == 0
            || self.optimistic.check_interval_secs == 0
            || self.elections.tick_interval_ms == 0
        {
            return Err(NodeError::Config("background intervals must be positive".into()));
        }
        if self.elections.max_blocks_per_election == 0 {
            return Err(NodeError::Config(
                "elections.max_blocks_per_election must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn active_elections_config(&self) -> ActiveElectionsConfig {
        let e = &self.elections;
        ActiveElectionsConfig {
            election_expiry_secs: e.election_expiry_secs,
            short_election_expiry_secs: e.short_election_expiry_secs,
            max_blocks_per_election: e.max_blocks_per_election,
            passive_secs: e.passive_secs,
            confirmation_request_interval_secs: e.confirmation_request_interval_secs,
            recently_confirmed_size: e.recently_confirmed_size,
        }
    }

    pub fn buckets_config(&self) -> BucketsConfig {
        BucketsConfig {
            max_blocks: self.scheduler.bucket_max_blocks,
        }
    }

    pub fn vote_cache_config(&self) -> VoteCacheConfig {
        VoteCacheConfig {
            max_size: self.vote_cache.max_size,
            max_voters: self.vote_cache.max_voters,
            age_cutoff_secs: self.vote_cache.age_cutoff_secs,
        }
    }

    pub fn online_reps_config(&self) -> OnlineRepsConfig {
        let r = &self.online_reps;
        let mut config = OnlineRepsConfig::for_network(self.network);
        config.quorum_percentage = r.quorum_percentage;
        config.weight_period_secs = r.weight_period_secs;
        config.max_samples = r.max_samples;
        if let Some(nano) = r.online_weight_minimum_nano {
            config.online_weight_minimum = Amount::nano(u128::from(nano));
        }
        if let Some(nano) = r.representative_vote_weight_minimum_nano {
            config.representative_vote_weight_minimum = Amount::nano(u128::from(nano));
        }
        config
    }

    pub fn hinted_config(&self) -> HintedConfig {
        HintedConfig {
            hinting_threshold_percent: self.hinted.hinting_threshold_percent,
            check_interval_secs: self.hinted.check_interval_secs,
        }
    }

    pub fn optimistic_config(&self) -> OptimisticConfig {
        let o = &self.optimistic;
        OptimisticConfig {
            enabled: o.enabled,
            gap_threshold: o.gap_threshold,
            max_size: o.max_size,
            activation_delay_secs: o.activation_delay_secs,
            check_interval_secs: o.check_interval_secs,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            data_dir: default_data_dir(),
            store_backend: StoreBackend::default(),
            lmdb_map_size: default_lmdb_map_size(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            enable_metrics: false,
            metrics_port: default_metrics_port(),
            block_index_size: default_block_index_size(),
            elections: ElectionsSection::default(),
            scheduler: SchedulerSection::default(),
            vote_cache: VoteCacheSection::default(),
            online_reps: OnlineRepsSection::default(),
            hinted: HintedSection::default(),
            optimistic: OptimisticSection::default(),
        }
    }
}

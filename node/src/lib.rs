//! lattice node: hosts the election core.
//!
//! The node:
//! - Loads representative weights and the online weight trend from the store
//! - Routes incoming votes to elections, caching the rest
//! - Queues new blocks for priority elections
//! - Runs the schedulers and the housekeeping loop
//! - Exposes prometheus metrics

pub mod block_index;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;

pub use block_index::BlockIndex;
pub use config::{NodeConfig, StoreBackend};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::{serve_metrics, GaugeSnapshot, NodeMetrics};
pub use node::{ChannelId, Node};
pub use shutdown::{ShutdownController, StopReason, StopSignal};

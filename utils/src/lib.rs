//! Shared utilities for lattice.

pub mod logging;
pub mod stats;
pub mod sync;

pub use logging::init_test_tracing;
pub use stats::StatsCounter;
pub use sync::{CondvarExt, MutexExt, RwLockExt};

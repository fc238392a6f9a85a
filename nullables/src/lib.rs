//! Nullable infrastructure.
//!
//! Each external dependency of the election core (clock, storage) has a real
//! implementation and a nullable one that:
//! - Returns deterministic values
//! - Can be controlled programmatically
//! - Never touches the filesystem
//!
//! The in-memory store doubles as the `memory` storage backend of the node.

pub mod clock;
pub mod store;

pub use clock::{Clock, NullClock, SystemClock};
pub use store::MemoryStore;

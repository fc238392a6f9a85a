//! Notifications about election lifecycle events.
//!
//! Observers are best-effort: an error returned from a callback is logged by
//! the registry and otherwise ignored. Callbacks run on the thread that
//! caused the event, after every registry lock is released, and must not
//! block.

use lattice_types::{Block, QualifiedRoot};
use std::sync::Arc;
use thiserror::Error;

use crate::election::{ElectionBehavior, ElectionStatus};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub trait ElectionObserver: Send + Sync {
    /// The winner of an election was confirmed and its confirmation height
    /// written.
    fn on_confirmed(&self, _block: &Arc<Block>, _status: &ElectionStatus) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_active_started(&self, _root: &QualifiedRoot, _behavior: ElectionBehavior) -> Result<(), ObserverError> {
        Ok(())
    }

    /// The election left the registry, confirmed or not.
    fn on_active_stopped(&self, _root: &QualifiedRoot) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Representatives should be asked to vote on `block`.
    fn on_confirmation_requested(&self, _root: &QualifiedRoot, _block: &Arc<Block>) -> Result<(), ObserverError> {
        Ok(())
    }
}

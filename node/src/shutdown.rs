//! Stop signalling for the node's background work.
//!
//! [`Node::stop`](crate::Node::stop) and the daemon's signal handler both
//! end in [`ShutdownController::stop`]. Each tokio loop holds a
//! [`StopSignal`] and selects on [`StopSignal::wait`] next to its interval.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Why the node is stopping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// `Node::stop` was called.
    Requested,
    Interrupt,
    Terminate,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::Requested => "requested",
            StopReason::Interrupt => "SIGINT",
            StopReason::Terminate => "SIGTERM",
        })
    }
}

pub struct ShutdownController {
    stopping: Arc<AtomicBool>,
    tx: broadcast::Sender<StopReason>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            stopping: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> StopSignal {
        StopSignal {
            stopping: self.stopping.clone(),
            rx: self.tx.subscribe(),
        }
    }

    /// Wake every [`StopSignal`]. Only the first call has an effect;
    /// returns whether this call was it.
    pub fn stop(&self, reason: StopReason) -> bool {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!(%reason, "node stopping");
        // No receivers just means no loop is running.
        let _ = self.tx.send(reason);
        true
    }

    /// Wait for SIGINT or SIGTERM and stop with the matching reason.
    ///
    /// Without a SIGTERM handler only SIGINT is awaited.
    pub async fn wait_for_signal(&self) -> StopReason {
        let interrupt = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let reason = tokio::select! {
            _ = interrupt => StopReason::Interrupt,
            _ = terminate => StopReason::Terminate,
        };
        self.stop(reason);
        reason
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// A background loop's handle on the stop flag.
pub struct StopSignal {
    stopping: Arc<AtomicBool>,
    rx: broadcast::Receiver<StopReason>,
}

impl StopSignal {
    /// Resolves once the node is stopping, also when the stop happened
    /// before this signal was handed out.
    pub async fn wait(&mut self) {
        if self.stopping.load(Ordering::SeqCst) {
            return;
        }
        // Closed or lagged both mean the controller is gone or already fired.
        let _ = self.rx.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn stop_wakes_every_signal() {
        let controller = ShutdownController::new();
        let (mut a, mut b) = (controller.subscribe(), controller.subscribe());
        assert!(!controller.is_stopping());
        assert!(controller.stop(StopReason::Requested));
        a.wait().await;
        b.wait().await;
        assert!(controller.is_stopping());
    }

    #[tokio::test]
    async fn only_first_stop_counts() {
        let controller = ShutdownController::new();
        assert!(controller.stop(StopReason::Terminate));
        assert!(!controller.stop(StopReason::Requested));
    }

    #[tokio::test]
    async fn signal_taken_after_stop_resolves() {
        let controller = ShutdownController::new();
        controller.stop(StopReason::Requested);
        let mut late = controller.subscribe();
        tokio::time::timeout(Duration::from_secs(1), late.wait())
            .await
            .expect("late signal should resolve");
    }

    #[tokio::test]
    async fn signal_pends_until_stop() {
        let controller = ShutdownController::new();
        let mut signal = controller.subscribe();
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.wait()).await;
        assert!(waited.is_err());
    }

    #[test]
    fn reasons_name_their_source() {
        assert_eq!(StopReason::Interrupt.to_string(), "SIGINT");
        assert_eq!(StopReason::Terminate.to_string(), "SIGTERM");
        assert_eq!(StopReason::Requested.to_string(), "requested");
    }
}

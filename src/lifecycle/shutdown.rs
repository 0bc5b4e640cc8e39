//! Graceful shutdown orchestration.
//!
//! # Shutdown Sequence
//! 1. Stop accepting new connections (close the listening socket)
//! 2. Let in-flight connections finish their current request
//! 3. Wait out a bounded grace period, then return regardless
//!
//! # Design Decisions
//! - Drain has timeout: force return after the deadline, matching spec's
//!   "bounded grace period" rather than waiting indefinitely
//! - Active-connection count is a plain atomic, not a registry of tasks:
//!   this proxy never needs to address an individual in-flight connection
//!   during shutdown, only count them

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    active_connections: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    pub fn active_connections(&self) -> Arc<AtomicUsize> {
        self.active_connections.clone()
    }

    /// Tell every subscriber (one per connection task) to stop reading the
    /// next pipelined request once its current one completes.
    pub fn begin_shutdown(&self) {
        tracing::info!("graceful shutdown initiated");
        let _ = self.sender.send(());
    }

    /// Wait for in-flight connections to reach zero, up to `grace_period`.
    pub async fn wait_for_drain(&self, grace_period: Duration) {
        let deadline = tokio::time::Instant::now() + grace_period;
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            if self.active_connections.load(Ordering::Acquire) == 0 {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    remaining = self.active_connections.load(Ordering::Acquire),
                    "grace period elapsed with connections still active"
                );
                return;
            }
            interval.tick().await;
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard incrementing the active-connection count for the lifetime of
/// one connection task.
pub struct ConnectionCountGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionCountGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for ConnectionCountGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_returns_immediately_with_no_active_connections() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.wait_for_drain(Duration::from_secs(5)).await;
    }

    #[tokio::test]
    async fn drain_times_out_while_a_connection_is_active() {
        let coordinator = ShutdownCoordinator::new();
        let _guard = ConnectionCountGuard::new(coordinator.active_connections());
        let started = tokio::time::Instant::now();
        coordinator.wait_for_drain(Duration::from_millis(50)).await;
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn begin_shutdown_notifies_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        coordinator.begin_shutdown();
        assert!(rx.try_recv().is_ok());
    }
}

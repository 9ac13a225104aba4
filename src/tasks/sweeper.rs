//! Periodic cleanup of closed connections and their bound identities.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::connection_manager::ConnectionRegistry;
use crate::metrics::ConnectionMetrics;
use crate::subscriber::SubscriberDirectory;

/// Background task removing connections whose transport has closed
pub struct SweeperTask {
    interval: Duration,
    registry: Arc<ConnectionRegistry>,
    directory: Arc<SubscriberDirectory>,
    shutdown: broadcast::Receiver<()>,
}

/// Counts from one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub pruned_connections: usize,
    pub dropped_identities: usize,
}

impl SweeperTask {
    pub fn new(
        interval: Duration,
        registry: Arc<ConnectionRegistry>,
        directory: Arc<SubscriberDirectory>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            interval,
            registry,
            directory,
            shutdown,
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.interval);
        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            sweep_interval_secs = self.interval.as_secs(),
            "Sweeper task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Sweeper task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.sweep();
                }
            }
        }

        tracing::info!("Sweeper task stopped");
    }

    /// One pass: prune closed connections, then drop identities left behind
    pub fn sweep(&self) -> SweepReport {
        let pruned = self.registry.prune_closed();
        for connection_id in &pruned {
            self.directory.unbind(connection_id);
        }

        let registry = &self.registry;
        let dropped = self
            .directory
            .retain(|connection_id| registry.contains(connection_id));

        let report = SweepReport {
            pruned_connections: pruned.len(),
            dropped_identities: dropped,
        };

        if report.pruned_connections > 0 || report.dropped_identities > 0 {
            ConnectionMetrics::record_pruned(report.pruned_connections as u64);
            tracing::info!(
                pruned_connections = report.pruned_connections,
                dropped_identities = report.dropped_identities,
                remaining = self.registry.len(),
                "Swept closed connections"
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_manager::{ConnectionHandle, ConnectionId};
    use crate::subscriber::Role;
    use tokio::sync::mpsc;

    fn sweeper() -> (SweeperTask, broadcast::Sender<()>) {
        let (tx, rx) = broadcast::channel(1);
        let task = SweeperTask::new(
            Duration::from_millis(20),
            Arc::new(ConnectionRegistry::new()),
            Arc::new(SubscriberDirectory::new()),
            rx,
        );
        (task, tx)
    }

    #[tokio::test]
    async fn test_sweep_removes_closed_connections_and_identities() {
        let (task, _tx) = sweeper();

        let (open_tx, _open_rx) = mpsc::channel(1);
        task.registry
            .register(ConnectionHandle::new(ConnectionId::from("open"), open_tx));
        task.directory.bind(ConnectionId::from("open"), "u1", Role::User);

        let (closed_tx, closed_rx) = mpsc::channel(1);
        task.registry
            .register(ConnectionHandle::new(ConnectionId::from("closed"), closed_tx));
        task.directory.bind(ConnectionId::from("closed"), "u2", Role::Admin);
        drop(closed_rx);

        // Identity whose connection was never registered
        task.directory.bind(ConnectionId::from("orphan"), "u3", Role::User);

        let report = task.sweep();
        assert_eq!(report.pruned_connections, 1);
        assert_eq!(report.dropped_identities, 1);
        assert_eq!(task.registry.len(), 1);
        assert_eq!(task.directory.len(), 1);
        assert!(task.directory.identity(&ConnectionId::from("open")).is_some());
    }

    #[tokio::test]
    async fn test_sweep_on_clean_state_is_noop() {
        let (task, _tx) = sweeper();
        assert_eq!(task.sweep(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (task, tx) = sweeper();
        let handle = tokio::spawn(task.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}

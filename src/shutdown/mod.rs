//! Graceful shutdown handling for the broadcast service.
//!
//! Shutdown runs in three phases:
//! 1. Mark the service as shutting down so new WebSocket upgrades are refused
//! 2. Signal socket loops and background tasks to stop
//! 3. Wait for connections to unregister, then clear whatever is left

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::connection_manager::ConnectionRegistry;
use crate::subscriber::SubscriberDirectory;

/// How often the drain phase polls the registry
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Process-wide stop signal shared by the server, socket loops and tasks
#[derive(Clone)]
pub struct ShutdownSignal {
    shutting_down: Arc<AtomicBool>,
    tx: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            shutting_down: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Mark shutting down and wake every subscriber. Returns false if the
    /// signal had already been triggered.
    pub fn trigger(&self) -> bool {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        // No receivers just means nothing is listening yet
        let _ = self.tx.send(());
        true
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles graceful shutdown of the broadcast service
pub struct GracefulShutdown {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<SubscriberDirectory>,
    signal: ShutdownSignal,
    drain_timeout: Duration,
}

impl GracefulShutdown {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<SubscriberDirectory>,
        signal: ShutdownSignal,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            directory,
            signal,
            drain_timeout,
        }
    }

    /// Execute graceful shutdown sequence
    #[tracing::instrument(
        name = "graceful_shutdown",
        skip(self),
        fields(total_connections = self.registry.len())
    )]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = Instant::now();
        let mut result = ShutdownResult {
            connections_at_start: self.registry.len(),
            ..Default::default()
        };

        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Refusing new connections");
        self.signal.trigger();

        tracing::info!("Phase 2: Waiting for connections to close");
        result.connections_closed = self.wait_for_connections_to_close().await;

        tracing::info!("Phase 3: Clearing remaining state");
        result.forcibly_cleared = self.registry.clear();
        let identities = self.directory.clear();

        result.duration = start.elapsed();

        tracing::info!(
            connections_at_start = result.connections_at_start,
            connections_closed = result.connections_closed,
            forcibly_cleared = result.forcibly_cleared,
            identities_cleared = identities,
            duration_ms = result.duration.as_millis() as u64,
            "Graceful shutdown completed"
        );

        result
    }

    async fn wait_for_connections_to_close(&self) -> usize {
        let initial = self.registry.len();
        if initial == 0 {
            return 0;
        }

        let registry = &self.registry;
        let wait_future = async {
            while !registry.is_empty() {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        };

        if timeout(self.drain_timeout, wait_future).await.is_err() {
            tracing::warn!(
                remaining_connections = self.registry.len(),
                "Some connections did not close gracefully"
            );
        }

        initial.saturating_sub(self.registry.len())
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Registered connections when shutdown began
    pub connections_at_start: usize,
    /// Connections that unregistered on their own within the drain timeout
    pub connections_closed: usize,
    /// Connections still registered after the drain timeout
    pub forcibly_cleared: usize,
    /// Total time taken for shutdown
    pub duration: Duration,
}

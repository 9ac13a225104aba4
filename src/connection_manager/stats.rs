//! Connection statistics structures

use serde::Serialize;

/// Connection statistics
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    /// Registered entries, including ones whose transport already closed
    pub total_connections: usize,
    pub live_connections: usize,
    /// Seconds since the least recently active live connection sent a frame
    pub oldest_idle_seconds: Option<i64>,
}

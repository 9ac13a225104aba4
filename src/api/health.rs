//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::connection_manager::ConnectionStats;
use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;
use crate::subscriber::RoleCounts;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: ConnectionHealthResponse,
    pub subscribers: SubscriberHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct ConnectionHealthResponse {
    pub registered: usize,
    pub live: usize,
}

#[derive(Debug, Serialize)]
pub struct SubscriberHealthResponse {
    pub admins: usize,
    pub users: usize,
    pub other: usize,
    /// Registered connections without a bound identity
    pub unclassified: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: ConnectionStats,
    pub subscribers: RoleCounts,
    pub broadcasts: DispatcherStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let conn_stats = state.registry.stats();
    let roles = state.directory.role_counts();

    let status = if state.shutdown.is_shutting_down() {
        "shutting_down"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        connections: ConnectionHealthResponse {
            registered: conn_stats.total_connections,
            live: conn_stats.live_connections,
        },
        subscribers: SubscriberHealthResponse {
            admins: roles.admins,
            users: roles.users,
            other: roles.other,
            unclassified: conn_stats.total_connections.saturating_sub(roles.total()),
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.registry.stats(),
        subscribers: state.directory.role_counts(),
        broadcasts: state.dispatcher.stats(),
    })
}

//! Prometheus metrics endpoint.

use axum::{extract::State, http::header, response::IntoResponse};

use crate::error::{AppError, Result};
use crate::metrics::{self, ConnectionMetrics};
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    // Gauges are refreshed from live state on every scrape
    ConnectionMetrics::update(&state.registry.stats(), &state.directory.role_counts());

    let output = metrics::encode_metrics().map_err(|e| {
        AppError::Internal(format!("Failed to encode metrics: {}", e))
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    ))
}

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::server::{api_key_auth, AppState};
use crate::triggers::{broadcast, entity_refresh, entity_update, user_activity};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

/// Upper bound for trigger request bodies
const API_BODY_LIMIT: usize = 1024 * 1024;

pub fn api_routes(state: AppState) -> Router<AppState> {
    let triggers = Router::new()
        .route("/broadcast", post(broadcast))
        .route("/entities/{entity}/updates", post(entity_update))
        .route("/entities/{entity}/refresh", post(entity_refresh))
        .route("/user-activity", post(user_activity))
        .layer(middleware::from_fn_with_state(state, api_key_auth))
        .layer(RequestBodyLimitLayer::new(API_BODY_LIMIT));

    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Trigger endpoints
        .nest("/api/v1", triggers)
}

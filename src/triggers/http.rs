//! HTTP endpoints that let backend services trigger broadcasts.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::notification::{Audience, DeliveryResult, DomainEntity};
use crate::server::AppState;
use crate::telemetry::sanitize_for_log;

/// Request to broadcast an arbitrary envelope
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    /// Target audience, defaults to every live connection
    #[serde(default)]
    pub audience: Audience,
    /// Envelope type
    #[serde(rename = "type")]
    pub kind: String,
    /// Envelope payload
    #[serde(default)]
    pub payload: Value,
}

/// Request to publish a created/updated/deleted entity
#[derive(Debug, Deserialize)]
pub struct EntityUpdateRequest {
    /// e.g. "CREATED", "UPDATED", "DELETED"
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

/// Request to report user activity to administrators
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivityRequest {
    pub user_id: String,
    pub activity: String,
}

/// Response for every trigger operation
#[derive(Debug, Serialize)]
pub struct DeliveryResponse {
    /// Whether at least one connection accepted the envelope
    pub success: bool,
    /// Number of connections the envelope was delivered to
    pub delivered_to: usize,
    /// Number of failed deliveries
    pub failed: usize,
    /// Role-bound connections that were no longer live
    pub skipped: usize,
    /// Timestamp of the operation
    pub timestamp: DateTime<Utc>,
}

impl From<DeliveryResult> for DeliveryResponse {
    fn from(result: DeliveryResult) -> Self {
        Self {
            success: result.success(),
            delivered_to: result.delivered,
            failed: result.failed,
            skipped: result.skipped,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcast an envelope to an audience
#[tracing::instrument(name = "api.broadcast", skip(state, body))]
pub async fn broadcast(
    State(state): State<AppState>,
    body: std::result::Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<DeliveryResponse>> {
    let Json(request) = body?;
    let kind = request.kind.as_str();
    if kind.trim().is_empty() {
        return Err(AppError::Validation("type must not be empty".into()));
    }

    let result = state
        .dispatcher
        .dispatch(request.audience, kind, &request.payload);

    tracing::info!(
        audience = request.audience.as_str(),
        message_type = %sanitize_for_log(kind),
        delivered = result.delivered,
        "Broadcast triggered over HTTP"
    );

    Ok(Json(result.into()))
}

/// Publish an entity change to every bound user
#[tracing::instrument(name = "api.entity_update", skip(state, entity, body), fields(entity = %sanitize_for_log(&entity)))]
pub async fn entity_update(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    body: std::result::Result<Json<EntityUpdateRequest>, JsonRejection>,
) -> Result<Json<DeliveryResponse>> {
    let entity = parse_entity(&entity)?;
    let Json(request) = body?;
    let action = request.action.trim();
    if action.is_empty() {
        return Err(AppError::Validation("action must not be empty".into()));
    }

    let result = state.publisher.entity_updated(entity, request.data, action);
    Ok(Json(result.into()))
}

/// Tell users to reload an entity list
#[tracing::instrument(name = "api.entity_refresh", skip(state, entity), fields(entity = %sanitize_for_log(&entity)))]
pub async fn entity_refresh(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> Result<Json<DeliveryResponse>> {
    let parsed = parse_entity(&entity)?;
    let result = state.publisher.entity_list_refresh(parsed).ok_or_else(|| {
        AppError::NotFound(format!(
            "{} has no list refresh signal",
            sanitize_for_log(&entity)
        ))
    })?;
    Ok(Json(result.into()))
}

/// Report user activity to administrators
#[tracing::instrument(name = "api.user_activity", skip(state, body))]
pub async fn user_activity(
    State(state): State<AppState>,
    body: std::result::Result<Json<UserActivityRequest>, JsonRejection>,
) -> Result<Json<DeliveryResponse>> {
    let Json(request) = body?;
    if request.user_id.trim().is_empty() {
        return Err(AppError::Validation("userId must not be empty".into()));
    }
    if request.activity.trim().is_empty() {
        return Err(AppError::Validation("activity must not be empty".into()));
    }

    let result = state
        .publisher
        .user_activity(&request.user_id, &request.activity);
    Ok(Json(result.into()))
}

fn parse_entity(raw: &str) -> Result<DomainEntity> {
    DomainEntity::parse(raw).ok_or_else(|| {
        AppError::Validation(format!("Unknown entity: {}", sanitize_for_log(raw)))
    })
}

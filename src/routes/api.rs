// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated ride members.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{DriftAlert, DriftAlertPayload};
use crate::services::cache::keys;
use crate::services::ingest::LocationInput;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// How long a ride's location snapshot is served from cache.
const RIDE_LOCATIONS_CACHE_TTL: Duration = Duration::from_secs(30);
const DEFAULT_DRIFT_ALERT_LIMIT: u32 = 20;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rides/{ride_id}/location", post(post_location))
        .route("/api/rides/{ride_id}/locations/batch", post(post_location_batch))
        .route("/api/rides/{ride_id}/locations", get(get_ride_locations))
        .route("/api/rides/{ride_id}/presence", get(get_presence))
        .route("/api/rides/{ride_id}/drift-alerts", get(get_drift_alerts))
}

async fn require_participant(state: &AppState, ride_id: &str, user: &AuthUser) -> Result<()> {
    if state.db.is_accepted_participant(ride_id, &user.user_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "not an accepted participant of ride {}",
            ride_id
        )))
    }
}

// ─── Location Reports ────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LocationAccepted {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
    /// Live connections the update was delivered to
    pub delivered: usize,
}

/// Report the caller's position on a ride.
async fn post_location(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
    Json(input): Json<LocationInput>,
) -> Result<Json<LocationAccepted>> {
    require_participant(&state, &ride_id, &user).await?;

    let outcome = state.ingest.ingest(&user.user_id, &ride_id, input).await?;

    Ok(Json(LocationAccepted {
        latitude: outcome.sample.latitude,
        longitude: outcome.sample.longitude,
        accuracy: outcome.sample.accuracy,
        timestamp: outcome.sample.timestamp,
        delivered: outcome.delivery.sent,
    }))
}

#[derive(Deserialize, Validate)]
pub struct BatchLocationRequest {
    #[validate(length(min = 1, max = 100, message = "batch must contain 1 to 100 locations"))]
    pub locations: Vec<LocationInput>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BatchItemResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BatchLocationResponse {
    pub accepted: usize,
    pub rejected: usize,
    pub results: Vec<BatchItemResult>,
}

/// Report several positions at once (e.g. after a connectivity gap).
async fn post_location_batch(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
    Json(request): Json<BatchLocationRequest>,
) -> Result<Json<BatchLocationResponse>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    require_participant(&state, &ride_id, &user).await?;

    let outcomes = state
        .ingest
        .ingest_batch(&user.user_id, &ride_id, request.locations)
        .await?;

    let results: Vec<BatchItemResult> = outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| match outcome {
            Ok(outcome) => BatchItemResult {
                index,
                success: true,
                timestamp: Some(outcome.sample.timestamp),
                error: None,
            },
            Err(e) => BatchItemResult {
                index,
                success: false,
                timestamp: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let accepted = results.iter().filter(|r| r.success).count();
    let rejected = results.len() - accepted;
    tracing::info!(
        user_id = %user.user_id,
        ride_id = %ride_id,
        accepted,
        rejected,
        "Batch location report"
    );

    Ok(Json(BatchLocationResponse {
        accepted,
        rejected,
        results,
    }))
}

// ─── Ride Snapshots ──────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ParticipantLocation {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Last known locations of all accepted participants.
async fn get_ride_locations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
) -> Result<Json<Vec<ParticipantLocation>>> {
    require_participant(&state, &ride_id, &user).await?;

    let cache_key = keys::ride_locations(&ride_id);
    match state.cache.get::<Vec<ParticipantLocation>>(&cache_key) {
        Ok(Some(cached)) => return Ok(Json(cached)),
        Ok(None) => {}
        Err(e) => tracing::debug!(ride_id = %ride_id, error = %e, "Ride locations cache read failed"),
    }

    let locations: Vec<ParticipantLocation> = state
        .drift
        .located_participants(&ride_id)
        .await?
        .into_iter()
        .map(|p| ParticipantLocation {
            user_id: p.user_id,
            latitude: p.location.latitude,
            longitude: p.location.longitude,
            accuracy: p.location.accuracy,
            timestamp: p.location.timestamp,
        })
        .collect();

    if let Err(e) = state
        .cache
        .set(&cache_key, &locations, Some(RIDE_LOCATIONS_CACHE_TTL))
    {
        tracing::warn!(ride_id = %ride_id, error = %e, "Failed to cache ride locations");
    }

    Ok(Json(locations))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PresenceResponse {
    pub ride_id: String,
    pub active_users: Vec<String>,
    pub connection_count: usize,
}

/// Who is live on the ride right now.
async fn get_presence(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
) -> Result<Json<PresenceResponse>> {
    require_participant(&state, &ride_id, &user).await?;

    Ok(Json(PresenceResponse {
        active_users: state.presence.roster(&ride_id),
        connection_count: state.registry.connection_count(&ride_id),
        ride_id,
    }))
}

#[derive(Deserialize, Validate)]
pub struct DriftAlertsQuery {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
}

/// Recent drift alerts, newest first.
async fn get_drift_alerts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<String>,
    Query(params): Query<DriftAlertsQuery>,
) -> Result<Json<Vec<DriftAlertPayload>>> {
    params
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    require_participant(&state, &ride_id, &user).await?;

    let limit = params.limit.unwrap_or(DEFAULT_DRIFT_ALERT_LIMIT);

    // The cache only holds the latest check's alerts; serve it when the
    // default window is asked for.
    if params.limit.is_none() {
        match state.cache.get::<Vec<DriftAlert>>(&keys::drift_alerts(&ride_id)) {
            Ok(Some(alerts)) => {
                return Ok(Json(alerts.iter().map(DriftAlertPayload::from).collect()))
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(ride_id = %ride_id, error = %e, "Drift alert cache read failed"),
        }
    }

    let alerts = state.db.recent_drift_alerts(&ride_id, limit).await?;
    Ok(Json(alerts.iter().map(DriftAlertPayload::from).collect()))
}

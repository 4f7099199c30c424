// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Drift detection against the in-memory store.

use chrono::Utc;
use ride_presence::models::location::CurrentLocation;
use ride_presence::models::{DriftAlert, LocationSample, ParticipantStatus};
use ride_presence::services::cache::keys;
use ride_presence::AppState;

mod common;
use common::{seed_participant, test_state};

async fn place(state: &AppState, ride_id: &str, user_id: &str, latitude: f64, longitude: f64) {
    let now = Utc::now();
    state
        .db
        .write_location_sample(&LocationSample {
            user_id: user_id.to_string(),
            ride_id: ride_id.to_string(),
            latitude,
            longitude,
            accuracy: None,
            timestamp: now,
            received_at: now,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_no_participants_no_alerts() {
    let state = test_state();
    assert!(state.drift.check_drift("empty").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_single_located_participant_no_alerts() {
    let state = test_state();
    seed_participant(&state, "r1", "solo", ParticipantStatus::Accepted).await;
    seed_participant(&state, "r1", "ghost", ParticipantStatus::Accepted).await;
    place(&state, "r1", "solo", 10.0, 10.0).await;

    assert!(state.drift.check_drift("r1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_straggler_flagged_and_persisted() {
    let state = test_state();
    for user in ["a", "b", "c", "d", "far"] {
        seed_participant(&state, "r1", user, ParticipantStatus::Accepted).await;
    }
    for user in ["a", "b", "c", "d"] {
        place(&state, "r1", user, 0.0, 0.0).await;
    }
    // Centroid ends up at 0.01° N: the pack is ~1.1 km from it, the
    // straggler ~4.4 km.
    place(&state, "r1", "far", 0.05, 0.0).await;

    let alerts = state.drift.check_drift("r1").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].user_id, "far");
    assert!((alerts[0].distance_km - 4.45).abs() < 0.05, "got {}", alerts[0].distance_km);
    assert_eq!(alerts[0].max_allowed_km, 2.0);

    let stored = state.db.recent_drift_alerts("r1", 10).await.unwrap();
    assert_eq!(stored.len(), 1);

    let cached: Vec<DriftAlert> = state
        .cache
        .get(&keys::drift_alerts("r1"))
        .unwrap()
        .unwrap();
    assert_eq!(cached.len(), 1);
}

#[tokio::test]
async fn test_alerts_not_deduplicated() {
    let state = test_state();
    for user in ["a", "b", "c", "d", "far"] {
        seed_participant(&state, "r1", user, ParticipantStatus::Accepted).await;
    }
    for user in ["a", "b", "c", "d"] {
        place(&state, "r1", user, 0.0, 0.0).await;
    }
    place(&state, "r1", "far", 0.05, 0.0).await;

    state.drift.check_drift("r1").await.unwrap();
    state.drift.check_drift("r1").await.unwrap();

    assert_eq!(state.db.recent_drift_alerts("r1", 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_non_accepted_participants_ignored() {
    let state = test_state();
    seed_participant(&state, "r1", "a", ParticipantStatus::Accepted).await;
    seed_participant(&state, "r1", "b", ParticipantStatus::Accepted).await;
    seed_participant(&state, "r1", "pending", ParticipantStatus::Pending).await;
    place(&state, "r1", "a", 0.0, 0.0).await;
    place(&state, "r1", "b", 0.0, 0.001).await;
    place(&state, "r1", "pending", 45.0, 45.0).await;

    assert!(state.drift.check_drift("r1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cached_location_preferred_over_storage() {
    let state = test_state();
    seed_participant(&state, "r1", "a", ParticipantStatus::Accepted).await;
    seed_participant(&state, "r1", "b", ParticipantStatus::Accepted).await;
    place(&state, "r1", "a", 0.0, 0.0).await;
    place(&state, "r1", "b", 0.0, 0.0).await;

    // Fresher position in cache only.
    state
        .cache
        .set(
            &keys::user_location("b"),
            &CurrentLocation {
                latitude: 1.0,
                longitude: 0.0,
                accuracy: None,
                timestamp: Utc::now(),
            },
            None,
        )
        .unwrap();

    let alerts = state.drift.check_drift("r1").await.unwrap();
    assert_eq!(alerts.len(), 2);
}

#[tokio::test]
async fn test_persistence_failure_is_an_error() {
    let state = test_state();
    seed_participant(&state, "r1", "a", ParticipantStatus::Accepted).await;
    seed_participant(&state, "r1", "b", ParticipantStatus::Accepted).await;
    place(&state, "r1", "a", 0.0, 0.0).await;
    place(&state, "r1", "b", 1.0, 0.0).await;

    state.db.as_memory().unwrap().set_fail_writes(true);
    assert!(state.drift.check_drift("r1").await.is_err());
}

#[tokio::test]
async fn test_partial_alert_persistence_reports_stored_alerts() {
    let state = test_state();
    for user in ["a", "b", "c", "d", "north", "south"] {
        seed_participant(&state, "r1", user, ParticipantStatus::Accepted).await;
    }
    for user in ["a", "b", "c", "d"] {
        place(&state, "r1", user, 0.0, 0.0).await;
    }
    // Symmetric stragglers keep the centroid at the pack.
    place(&state, "r1", "north", 0.05, 0.0).await;
    place(&state, "r1", "south", -0.05, 0.0).await;

    state.db.as_memory().unwrap().reject_alerts_for("north");

    let alerts = state.drift.check_drift("r1").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].user_id, "south");

    let stored = state.db.recent_drift_alerts("r1", 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id, "south");

    let cached: Vec<DriftAlert> = state
        .cache
        .get(&keys::drift_alerts("r1"))
        .unwrap()
        .unwrap();
    assert_eq!(cached.len(), 1);
}

#[tokio::test]
async fn test_every_alert_write_failing_is_an_error() {
    let state = test_state();
    for user in ["a", "b", "c", "d", "north"] {
        seed_participant(&state, "r1", user, ParticipantStatus::Accepted).await;
    }
    for user in ["a", "b", "c", "d"] {
        place(&state, "r1", user, 0.0, 0.0).await;
    }
    place(&state, "r1", "north", 0.05, 0.0).await;

    state.db.as_memory().unwrap().reject_alerts_for("north");
    assert!(state.drift.check_drift("r1").await.is_err());
    assert!(state.db.recent_drift_alerts("r1", 10).await.unwrap().is_empty());
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST). Without it they are skipped.

use chrono::{Duration, Utc};
use ride_presence::db::RideStore;
use ride_presence::models::{DriftAlert, LocationSample, Participant, ParticipantStatus};

mod common;

/// Generate a unique ID for test isolation.
fn unique_id(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

async fn test_db() -> RideStore {
    RideStore::firestore("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[tokio::test]
async fn test_participant_membership() {
    require_emulator!();
    let db = test_db().await;
    let ride = unique_id("ride");

    for (user, status) in [
        ("alice", ParticipantStatus::Accepted),
        ("bob", ParticipantStatus::Pending),
        ("carol", ParticipantStatus::Accepted),
    ] {
        db.upsert_participant(&Participant {
            ride_id: ride.clone(),
            user_id: user.to_string(),
            status,
        })
        .await
        .unwrap();
    }

    assert!(db.is_accepted_participant(&ride, "alice").await.unwrap());
    assert!(!db.is_accepted_participant(&ride, "bob").await.unwrap());
    assert!(!db.is_accepted_participant(&ride, "nobody").await.unwrap());

    let mut accepted = db.accepted_participants(&ride).await.unwrap();
    accepted.sort();
    assert_eq!(accepted, vec!["alice", "carol"]);
}

#[tokio::test]
async fn test_location_sample_updates_current_location() {
    require_emulator!();
    let db = test_db().await;
    let ride = unique_id("ride");
    let user = unique_id("user");

    let now = Utc::now();
    db.write_location_sample(&LocationSample {
        user_id: user.clone(),
        ride_id: ride.clone(),
        latitude: 37.4,
        longitude: -122.1,
        accuracy: Some(8.0),
        timestamp: now,
        received_at: now,
    })
    .await
    .unwrap();

    let current = db.last_known_location(&user).await.unwrap().unwrap();
    assert_eq!(current.latitude, 37.4);
    assert_eq!(current.longitude, -122.1);
    assert_eq!(current.accuracy, Some(8.0));

    assert!(db
        .last_known_location(&unique_id("user"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_recent_drift_alerts_ordering() {
    require_emulator!();
    let db = test_db().await;
    let ride = unique_id("ride");
    let base = Utc::now();

    for (i, user) in ["a", "b", "c"].iter().enumerate() {
        db.write_drift_alert(&DriftAlert {
            ride_id: ride.clone(),
            user_id: user.to_string(),
            distance_km: 3.0 + i as f64,
            max_allowed_km: 2.0,
            latitude: 0.0,
            longitude: 0.0,
            created_at: base + Duration::seconds(i as i64),
        })
        .await
        .unwrap();
    }

    let recent = db.recent_drift_alerts(&ride, 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].user_id, "c");
    assert_eq!(recent[1].user_id, "b");
}

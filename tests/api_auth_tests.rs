// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Non-participants are refused with 403
//! 3. Participants can read presence and location snapshots
//! 4. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use ride_presence::models::ParticipantStatus;
use ride_presence::services::auth::create_jwt;
use serde_json::Value;
use tower::ServiceExt;

mod common;
use common::{client_channel, create_test_app, create_test_jwt, seed_participant};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rides/r1/presence")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rides/r1/presence")
                .header(header::AUTHORIZATION, "Bearer invalid_token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_wrong_key() {
    let (app, _) = create_test_app();
    let token = create_jwt("alice", "alice@example.com", b"wrong_key_wrong_key_wrong_key!!", 3600).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rides/r1/presence")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_participant_forbidden() {
    let (app, state) = create_test_app();
    seed_participant(&state, "r1", "alice", ParticipantStatus::Rejected).await;
    let token = create_test_jwt("alice");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rides/r1/presence")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_presence_with_cookie() {
    let (app, state) = create_test_app();
    seed_participant(&state, "r1", "alice", ParticipantStatus::Accepted).await;
    let (phone, _phone_rx) = client_channel();
    let (watch, _watch_rx) = client_channel();
    state.presence.join(phone, "alice", "r1");
    state.presence.join(watch, "alice", "r1");

    let token = create_test_jwt("alice");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rides/r1/presence")
                .header(header::COOKIE, format!("ride_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ride_id"], "r1");
    assert_eq!(body["active_users"], serde_json::json!(["alice"]));
    assert_eq!(body["connection_count"], 2);
}

#[tokio::test]
async fn test_post_location_and_read_back() {
    let (app, state) = create_test_app();
    seed_participant(&state, "r1", "alice", ParticipantStatus::Accepted).await;
    let token = create_test_jwt("alice");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/rides/r1/location")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"latitude":37.4,"longitude":-122.1}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["latitude"], 37.4);
    assert_eq!(body["delivered"], 0);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rides/r1/locations")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["user_id"], "alice");
    assert_eq!(body[0]["longitude"], -122.1);
}

#[tokio::test]
async fn test_drift_alerts_listing() {
    let (app, state) = create_test_app();
    seed_participant(&state, "r1", "alice", ParticipantStatus::Accepted).await;
    let token = create_test_jwt("alice");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rides/r1/drift-alerts?limit=5")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["live_rides"], 0);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/rides/r1/location")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:3000"
    );
}

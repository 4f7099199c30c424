// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use ride_presence::config::Config;
use ride_presence::db::RideStore;
use ride_presence::models::{Participant, ParticipantStatus, ServerMessage};
use ride_presence::routes::create_router;
use ride_presence::services::auth::create_jwt;
use ride_presence::services::registry::{ConnectionHandle, Outbound};
use ride_presence::services::CacheService;
use ride_presence::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test state on the in-memory backend.
#[allow(dead_code)]
pub fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(
        Config::test_default(),
        RideStore::memory(),
        CacheService::new(),
    ))
}

/// Create a test app with in-memory dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = test_state();
    (create_router(state.clone()), state)
}

/// Access token for `user_id` signed with the test key.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str) -> String {
    create_jwt(
        user_id,
        &format!("{}@example.com", user_id),
        &Config::test_default().jwt_secret,
        3600,
    )
    .unwrap()
}

/// Add a membership record.
#[allow(dead_code)]
pub async fn seed_participant(state: &AppState, ride_id: &str, user_id: &str, status: ParticipantStatus) {
    state
        .db
        .upsert_participant(&Participant {
            ride_id: ride_id.to_string(),
            user_id: user_id.to_string(),
            status,
        })
        .await
        .unwrap();
}

/// Outbound queue for a fake client.
#[allow(dead_code)]
pub fn client_channel() -> (ConnectionHandle, mpsc::Receiver<Outbound>) {
    ConnectionHandle::channel(64)
}

/// Everything queued for a client so far.
#[allow(dead_code)]
pub fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        if let Outbound::Message(msg) = item {
            out.push((*msg).clone());
        }
    }
    out
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Ride Presence: live location sharing for group rides
//!
//! This crate provides the backend for ride channels: who is connected to a
//! ride, fan-out of each rider's location to the group, and alerts when a
//! rider drifts away from the pack.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::RideStore;
use services::{
    CacheService, ConnectionRegistry, DriftDetector, LocationIngest, PresenceNotifier,
    TokenVerifier,
};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: RideStore,
    pub cache: CacheService,
    pub registry: Arc<ConnectionRegistry>,
    pub presence: PresenceNotifier,
    pub drift: DriftDetector,
    pub ingest: LocationIngest,
    pub token_verifier: TokenVerifier,
}

impl AppState {
    /// Wire services together around one registry.
    pub fn new(config: Config, db: RideStore, cache: CacheService) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let presence = PresenceNotifier::new(registry.clone());
        let drift = DriftDetector::new(db.clone(), cache.clone(), config.drift_alert_distance_km);
        let ingest = LocationIngest::new(
            db.clone(),
            cache.clone(),
            presence.clone(),
            drift.clone(),
            Duration::from_secs(config.location_cache_ttl_secs),
        );
        let token_verifier = TokenVerifier::new(&config.jwt_secret);

        Self {
            config,
            db,
            cache,
            registry,
            presence,
            drift,
            ingest,
            token_verifier,
        }
    }
}

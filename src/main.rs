// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ride Presence API Server
//!
//! Serves live ride channels over WebSocket plus a small REST API for
//! location reports, rosters and drift alerts.

use ride_presence::{
    config::{Config, StorageBackend},
    db::RideStore,
    services::CacheService,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        storage = ?config.storage_backend,
        drift_alert_distance_km = config.drift_alert_distance_km,
        "Starting Ride Presence API"
    );

    let db = match config.storage_backend {
        StorageBackend::Firestore => RideStore::firestore(&config.gcp_project_id)
            .await
            .expect("Failed to connect to Firestore"),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            RideStore::memory()
        }
    };

    let state = Arc::new(AppState::new(config.clone(), db, CacheService::new()));

    // Build router
    let app = ride_presence::routes::create_router(state.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        live_rides = state.registry.ride_count(),
        "Server stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ride_presence=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}

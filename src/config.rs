// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Loaded once at startup; a `.env` file is honored for local development.

use std::env;
use std::str::FromStr;

/// Default drift threshold (kilometers from the group centroid).
pub const DEFAULT_DRIFT_ALERT_DISTANCE_KM: f64 = 2.0;
/// Default lifetime of a cached "current location" entry.
pub const DEFAULT_LOCATION_CACHE_TTL_SECS: u64 = 300;
/// Default per-connection outbound queue depth.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Which storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    /// In-process store for local development and tests.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StorageBackend::Firestore),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Storage backend selection
    pub storage_backend: StorageBackend,

    // --- Live tracking tunables ---
    /// Distance from the group centroid beyond which a rider is flagged
    pub drift_alert_distance_km: f64,
    /// TTL for `user_location:{id}` cache entries
    pub location_cache_ttl_secs: u64,
    /// Outbound messages buffered per connection before it counts as dead
    pub outbound_queue_capacity: usize,

    // --- Secrets ---
    /// HS256 key used to verify access tokens (raw bytes)
    pub jwt_secret: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => StorageBackend::Firestore,
        };

        let outbound_queue_capacity =
            parse_or("OUTBOUND_QUEUE_CAPACITY", DEFAULT_OUTBOUND_QUEUE_CAPACITY)?;
        if outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "OUTBOUND_QUEUE_CAPACITY",
                "0".to_string(),
            ));
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            storage_backend,
            drift_alert_distance_km: parse_or(
                "DRIFT_ALERT_DISTANCE_KM",
                DEFAULT_DRIFT_ALERT_DISTANCE_KM,
            )?,
            location_cache_ttl_secs: parse_or(
                "LOCATION_CACHE_TTL_SECS",
                DEFAULT_LOCATION_CACHE_TTL_SECS,
            )?,
            outbound_queue_capacity,
            jwt_secret: env::var("JWT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("JWT_SECRET"))?
                .into_bytes(),
        })
    }

    /// Config for tests: in-memory storage and a fixed signing key.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            drift_alert_distance_km: DEFAULT_DRIFT_ALERT_DISTANCE_KM,
            location_cache_ttl_secs: DEFAULT_LOCATION_CACHE_TTL_SECS,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            jwt_secret: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Drift alert record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A participant found further from the group centroid than allowed.
///
/// Alerts are append-only: every drift check that finds a straggler writes a
/// new record, even if an identical one was written a moment ago.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAlert {
    pub ride_id: String,
    pub user_id: String,
    /// Great-circle distance from the centroid (km)
    pub distance_km: f64,
    /// Threshold in force when the alert was raised (km)
    pub max_allowed_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
}

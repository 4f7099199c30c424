// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Group drift detection.
//!
//! A rider is "drifting" when their last known position is further than the
//! configured threshold from the planar centroid of every located accepted
//! participant.

use crate::db::RideStore;
use crate::error::AppError;
use crate::models::location::CurrentLocation;
use crate::models::{Coordinates, DriftAlert};
use crate::services::cache::{keys, CacheService};
use crate::services::distance::{distance_km, planar_centroid};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// How long the last batch of alerts stays in the cache.
const DRIFT_ALERT_CACHE_TTL: Duration = Duration::from_secs(300);

/// A participant together with their last known position.
#[derive(Debug, Clone)]
pub struct LocatedParticipant {
    pub user_id: String,
    pub location: CurrentLocation,
}

/// Flag every participant strictly further than `threshold_km` from `centroid`.
pub fn find_drifters(
    ride_id: &str,
    participants: &[LocatedParticipant],
    centroid: Coordinates,
    threshold_km: f64,
    now: DateTime<Utc>,
) -> Vec<DriftAlert> {
    participants
        .iter()
        .filter_map(|p| {
            let position = p.location.coordinates();
            let distance = distance_km(position, centroid);
            (distance > threshold_km).then(|| DriftAlert {
                ride_id: ride_id.to_string(),
                user_id: p.user_id.clone(),
                distance_km: distance,
                max_allowed_km: threshold_km,
                latitude: position.latitude,
                longitude: position.longitude,
                created_at: now,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct DriftDetector {
    db: RideStore,
    cache: CacheService,
    threshold_km: f64,
}

impl DriftDetector {
    pub fn new(db: RideStore, cache: CacheService, threshold_km: f64) -> Self {
        Self {
            db,
            cache,
            threshold_km,
        }
    }

    pub fn threshold_km(&self) -> f64 {
        self.threshold_km
    }

    /// Last known location of a user: cache first, storage fallback.
    pub async fn current_location(
        &self,
        user_id: &str,
    ) -> Result<Option<CurrentLocation>, AppError> {
        match self.cache.get::<CurrentLocation>(&keys::user_location(user_id)) {
            Ok(Some(location)) => return Ok(Some(location)),
            Ok(None) => {}
            Err(e) => tracing::debug!(user_id, error = %e, "Location cache read failed"),
        }
        self.db.last_known_location(user_id).await
    }

    /// Accepted participants of a ride that have a known location.
    pub async fn located_participants(
        &self,
        ride_id: &str,
    ) -> Result<Vec<LocatedParticipant>, AppError> {
        let user_ids = self.db.accepted_participants(ride_id).await?;

        let mut located = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            if let Some(location) = self.current_location(&user_id).await? {
                located.push(LocatedParticipant { user_id, location });
            }
        }
        Ok(located)
    }

    /// Evaluate the ride and persist any new alerts.
    pub async fn check_drift(&self, ride_id: &str) -> Result<Vec<DriftAlert>, AppError> {
        let located = self.located_participants(ride_id).await?;
        if located.len() < 2 {
            return Ok(Vec::new());
        }

        let positions: Vec<Coordinates> = located.iter().map(|p| p.location.coordinates()).collect();
        let Some(centroid) = planar_centroid(&positions) else {
            return Ok(Vec::new());
        };

        let alerts = find_drifters(ride_id, &located, centroid, self.threshold_km, Utc::now());
        if alerts.is_empty() {
            tracing::debug!(ride_id, located = located.len(), "No drift");
            return Ok(alerts);
        }

        // Write every alert, then report only the ones that were stored.
        let flagged = alerts.len();
        let mut persisted = Vec::with_capacity(flagged);
        let mut last_error = None;
        for alert in alerts {
            match self.db.write_drift_alert(&alert).await {
                Ok(()) => {
                    tracing::warn!(
                        ride_id,
                        user_id = %alert.user_id,
                        distance_km = alert.distance_km,
                        max_allowed_km = alert.max_allowed_km,
                        "Rider drifted from group"
                    );
                    persisted.push(alert);
                }
                Err(e) => {
                    tracing::error!(
                        ride_id,
                        user_id = %alert.user_id,
                        error = %e,
                        "Failed to persist drift alert"
                    );
                    last_error = Some(e);
                }
            }
        }

        if persisted.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        } else if persisted.len() < flagged {
            tracing::warn!(
                ride_id,
                persisted = persisted.len(),
                flagged,
                "Only some drift alerts were persisted"
            );
        }
        let alerts = persisted;

        if let Err(e) = self.cache.set(
            &keys::drift_alerts(ride_id),
            &alerts,
            Some(DRIFT_ALERT_CACHE_TTL),
        ) {
            tracing::warn!(ride_id, error = %e, "Failed to cache drift alerts");
        }

        Ok(alerts)
    }
}

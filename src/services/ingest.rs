// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Location ingest: validate, persist, cache, broadcast, then check drift.

use crate::db::RideStore;
use crate::error::AppError;
use crate::models::location::CurrentLocation;
use crate::models::{Coordinates, DriftAlertPayload, LocationSample, ServerMessage};
use crate::services::cache::{keys, CacheService};
use crate::services::drift::DriftDetector;
use crate::services::presence::PresenceNotifier;
use crate::services::registry::BroadcastReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Upper bound on samples in one batch request.
pub const MAX_BATCH_SIZE: usize = 100;

/// One reported position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LocationInput {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationInput {
    fn validate(&self) -> Result<(), AppError> {
        Coordinates::new(self.latitude, self.longitude).validate()?;
        if let Some(accuracy) = self.accuracy {
            if accuracy.is_nan() || accuracy < 0.0 {
                return Err(AppError::Validation(
                    "accuracy must be non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Result of a successful ingest.
#[derive(Debug)]
pub struct IngestOutcome {
    pub sample: LocationSample,
    pub delivery: BroadcastReport,
    /// Background drift evaluation. Dropping it does not cancel the check.
    pub drift_check: JoinHandle<()>,
}

#[derive(Clone)]
pub struct LocationIngest {
    db: RideStore,
    cache: CacheService,
    presence: PresenceNotifier,
    drift: DriftDetector,
    location_ttl: Duration,
}

impl LocationIngest {
    pub fn new(
        db: RideStore,
        cache: CacheService,
        presence: PresenceNotifier,
        drift: DriftDetector,
        location_ttl: Duration,
    ) -> Self {
        Self {
            db,
            cache,
            presence,
            drift,
            location_ttl,
        }
    }

    /// Accept one location report from a ride member.
    ///
    /// Nothing is broadcast unless the sample was persisted.
    pub async fn ingest(
        &self,
        user_id: &str,
        ride_id: &str,
        input: LocationInput,
    ) -> Result<IngestOutcome, AppError> {
        input.validate()?;

        let received_at = Utc::now();
        let sample = LocationSample {
            user_id: user_id.to_string(),
            ride_id: ride_id.to_string(),
            latitude: input.latitude,
            longitude: input.longitude,
            accuracy: input.accuracy,
            timestamp: input.timestamp.unwrap_or(received_at),
            received_at,
        };

        self.db.write_location_sample(&sample).await.map_err(|e| {
            tracing::error!(user_id, ride_id, error = %e, "Failed to persist location sample");
            e
        })?;

        if let Err(e) = self.cache.set(
            &keys::user_location(user_id),
            &CurrentLocation::from(&sample),
            Some(self.location_ttl),
        ) {
            tracing::warn!(user_id, error = %e, "Failed to cache current location");
        }

        let delivery = self.presence.broadcast(
            ride_id,
            ServerMessage::LocationUpdate {
                user_id: sample.user_id.clone(),
                latitude: sample.latitude,
                longitude: sample.longitude,
                accuracy: sample.accuracy,
                timestamp: sample.timestamp,
            },
            None,
        );

        tracing::debug!(
            user_id,
            ride_id,
            sent = delivery.sent,
            failed = delivery.failed,
            "Location ingested"
        );

        let drift_check = self.spawn_drift_check(ride_id);

        Ok(IngestOutcome {
            sample,
            delivery,
            drift_check,
        })
    }

    /// Ingest several samples, each independently. Order of results matches input.
    pub async fn ingest_batch(
        &self,
        user_id: &str,
        ride_id: &str,
        inputs: Vec<LocationInput>,
    ) -> Result<Vec<Result<IngestOutcome, AppError>>, AppError> {
        if inputs.is_empty() || inputs.len() > MAX_BATCH_SIZE {
            return Err(AppError::Validation(format!(
                "batch must contain 1 to {} locations",
                MAX_BATCH_SIZE
            )));
        }

        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.ingest(user_id, ride_id, input).await);
        }
        Ok(results)
    }

    fn spawn_drift_check(&self, ride_id: &str) -> JoinHandle<()> {
        let drift = self.drift.clone();
        let presence = self.presence.clone();
        let ride_id = ride_id.to_string();

        tokio::spawn(async move {
            match drift.check_drift(&ride_id).await {
                Ok(alerts) if alerts.is_empty() => {}
                Ok(alerts) => {
                    let message = ServerMessage::DriftAlert {
                        alerts: alerts.iter().map(DriftAlertPayload::from).collect(),
                        timestamp: Utc::now(),
                    };
                    presence.broadcast(&ride_id, message, None);
                }
                Err(e) => {
                    tracing::error!(ride_id = %ride_id, error = %e, "Drift check failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(latitude: f64, longitude: f64, accuracy: Option<f64>) -> LocationInput {
        LocationInput {
            latitude,
            longitude,
            accuracy,
            timestamp: None,
        }
    }

    #[test]
    fn test_input_validation() {
        assert!(input(37.0, -122.0, None).validate().is_ok());
        assert!(input(37.0, -122.0, Some(0.0)).validate().is_ok());
        assert!(input(91.0, 0.0, None).validate().is_err());
        assert!(input(0.0, 181.0, None).validate().is_err());
        assert!(input(0.0, 0.0, Some(-1.0)).validate().is_err());
        assert!(input(0.0, 0.0, Some(f64::NAN)).validate().is_err());
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Ride participants (membership lookups)
//! - Location samples (append-only history)
//! - Current locations (last known position per user)
//! - Drift alerts (append-only)

use crate::db::collections;
use crate::error::AppError;
use crate::models::location::CurrentLocation;
use crate::models::participant::participant_document_id;
use crate::models::{DriftAlert, LocationSample, Participant};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── Participant Operations ──────────────────────────────────

    /// Get the membership record for a (ride, user) pair.
    pub async fn get_participant(
        &self,
        ride_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::RIDE_PARTICIPANTS)
            .obj()
            .one(&participant_document_id(ride_id, user_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All participants of a ride with `accepted` status.
    pub async fn get_accepted_participants(
        &self,
        ride_id: &str,
    ) -> Result<Vec<Participant>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::RIDE_PARTICIPANTS)
            .filter(|q| {
                q.for_all([
                    q.field("ride_id").eq(ride_id),
                    q.field("status").eq("accepted"),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a membership record.
    pub async fn upsert_participant(&self, participant: &Participant) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::RIDE_PARTICIPANTS)
            .document_id(participant.document_id())
            .object(participant)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Location Operations ─────────────────────────────────────

    /// Append a sample and move the user's current location.
    pub async fn write_location_sample(&self, sample: &LocationSample) -> Result<(), AppError> {
        let doc_id = format!(
            "{}_{}_{}",
            sample.ride_id,
            sample.user_id,
            sample.received_at.timestamp_micros()
        );

        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::LOCATION_SAMPLES)
            .document_id(doc_id)
            .object(sample)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::CURRENT_LOCATIONS)
            .document_id(&sample.user_id)
            .object(&CurrentLocation::from(sample))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Last known location of a user, if any was ever recorded.
    pub async fn get_current_location(
        &self,
        user_id: &str,
    ) -> Result<Option<CurrentLocation>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::CURRENT_LOCATIONS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Drift Alert Operations ──────────────────────────────────

    pub async fn write_drift_alert(&self, alert: &DriftAlert) -> Result<(), AppError> {
        let doc_id = format!(
            "{}_{}_{}",
            alert.ride_id,
            alert.user_id,
            alert.created_at.timestamp_micros()
        );

        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::DRIFT_ALERTS)
            .document_id(doc_id)
            .object(alert)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Most recent drift alerts for a ride, newest first.
    pub async fn get_recent_drift_alerts(
        &self,
        ride_id: &str,
        limit: u32,
    ) -> Result<Vec<DriftAlert>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::DRIFT_ALERTS)
            .filter(|q| q.for_all([q.field("ride_id").eq(ride_id)]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

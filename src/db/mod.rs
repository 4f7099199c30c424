//! Database layer (Firestore, or in-memory for development).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::location::CurrentLocation;
use crate::models::{DriftAlert, LocationSample, Participant};
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const RIDE_PARTICIPANTS: &str = "ride_participants";
    /// Append-only location history
    pub const LOCATION_SAMPLES: &str = "location_samples";
    /// Last known location (keyed by user_id)
    pub const CURRENT_LOCATIONS: &str = "current_locations";
    pub const DRIFT_ALERTS: &str = "drift_alerts";
}

/// Persistent store for ride membership, locations and drift alerts.
#[derive(Clone)]
pub enum RideStore {
    Firestore(FirestoreStore),
    Memory(Arc<MemoryStore>),
}

impl RideStore {
    pub async fn firestore(project_id: &str) -> Result<Self, AppError> {
        Ok(RideStore::Firestore(FirestoreStore::new(project_id).await?))
    }

    pub fn memory() -> Self {
        RideStore::Memory(Arc::new(MemoryStore::new()))
    }

    /// The in-memory backend, if that is what this is.
    pub fn as_memory(&self) -> Option<&MemoryStore> {
        match self {
            RideStore::Memory(store) => Some(store),
            RideStore::Firestore(_) => None,
        }
    }

    /// Whether the user has an accepted membership on the ride.
    pub async fn is_accepted_participant(
        &self,
        ride_id: &str,
        user_id: &str,
    ) -> Result<bool, AppError> {
        let participant = match self {
            RideStore::Firestore(db) => db.get_participant(ride_id, user_id).await?,
            RideStore::Memory(db) => db.get_participant(ride_id, user_id),
        };
        Ok(participant.is_some_and(|p| p.is_accepted()))
    }

    /// User IDs of all accepted participants.
    pub async fn accepted_participants(&self, ride_id: &str) -> Result<Vec<String>, AppError> {
        let participants = match self {
            RideStore::Firestore(db) => db.get_accepted_participants(ride_id).await?,
            RideStore::Memory(db) => db.get_accepted_participants(ride_id),
        };
        Ok(participants.into_iter().map(|p| p.user_id).collect())
    }

    pub async fn upsert_participant(&self, participant: &Participant) -> Result<(), AppError> {
        match self {
            RideStore::Firestore(db) => db.upsert_participant(participant).await,
            RideStore::Memory(db) => db.upsert_participant(participant),
        }
    }

    pub async fn write_location_sample(&self, sample: &LocationSample) -> Result<(), AppError> {
        match self {
            RideStore::Firestore(db) => db.write_location_sample(sample).await,
            RideStore::Memory(db) => db.write_location_sample(sample),
        }
    }

    pub async fn last_known_location(
        &self,
        user_id: &str,
    ) -> Result<Option<CurrentLocation>, AppError> {
        match self {
            RideStore::Firestore(db) => db.get_current_location(user_id).await,
            RideStore::Memory(db) => Ok(db.get_current_location(user_id)),
        }
    }

    pub async fn write_drift_alert(&self, alert: &DriftAlert) -> Result<(), AppError> {
        match self {
            RideStore::Firestore(db) => db.write_drift_alert(alert).await,
            RideStore::Memory(db) => db.write_drift_alert(alert),
        }
    }

    pub async fn recent_drift_alerts(
        &self,
        ride_id: &str,
        limit: u32,
    ) -> Result<Vec<DriftAlert>, AppError> {
        match self {
            RideStore::Firestore(db) => db.get_recent_drift_alerts(ride_id, limit).await,
            RideStore::Memory(db) => Ok(db.get_recent_drift_alerts(ride_id, limit)),
        }
    }
}

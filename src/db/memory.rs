// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store with the same contract as the Firestore backend.
//!
//! Used for local development (`STORAGE_BACKEND=memory`) and tests.

use crate::error::AppError;
use crate::models::location::CurrentLocation;
use crate::models::participant::participant_document_id;
use crate::models::{DriftAlert, LocationSample, Participant};
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct MemoryStore {
    participants: DashMap<String, Participant>,
    current_locations: DashMap<String, CurrentLocation>,
    samples: Mutex<Vec<LocationSample>>,
    alerts: Mutex<Vec<DriftAlert>>,
    fail_writes: AtomicBool,
    rejected_alert_users: DashSet<String>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a database error.
    ///
    /// Fault injection for exercising write-failure paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make drift alert writes about `user_id` fail, leaving other writes alone.
    pub fn reject_alerts_for(&self, user_id: &str) {
        self.rejected_alert_users.insert(user_id.to_string());
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("write rejected (fault injection)".to_string()));
        }
        Ok(())
    }

    pub fn get_participant(&self, ride_id: &str, user_id: &str) -> Option<Participant> {
        self.participants
            .get(&participant_document_id(ride_id, user_id))
            .map(|p| p.clone())
    }

    pub fn get_accepted_participants(&self, ride_id: &str) -> Vec<Participant> {
        let mut accepted: Vec<Participant> = self
            .participants
            .iter()
            .filter(|p| p.ride_id == ride_id && p.is_accepted())
            .map(|p| p.clone())
            .collect();
        accepted.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        accepted
    }

    pub fn upsert_participant(&self, participant: &Participant) -> Result<(), AppError> {
        self.check_writable()?;
        self.participants
            .insert(participant.document_id(), participant.clone());
        Ok(())
    }

    pub fn write_location_sample(&self, sample: &LocationSample) -> Result<(), AppError> {
        self.check_writable()?;
        lock(&self.samples).push(sample.clone());
        self.current_locations
            .insert(sample.user_id.clone(), CurrentLocation::from(sample));
        Ok(())
    }

    pub fn get_current_location(&self, user_id: &str) -> Option<CurrentLocation> {
        self.current_locations.get(user_id).map(|l| l.clone())
    }

    pub fn write_drift_alert(&self, alert: &DriftAlert) -> Result<(), AppError> {
        self.check_writable()?;
        if self.rejected_alert_users.contains(&alert.user_id) {
            return Err(AppError::Database(format!(
                "alert write for {} rejected (fault injection)",
                alert.user_id
            )));
        }
        lock(&self.alerts).push(alert.clone());
        Ok(())
    }

    pub fn get_recent_drift_alerts(&self, ride_id: &str, limit: u32) -> Vec<DriftAlert> {
        let mut alerts: Vec<DriftAlert> = lock(&self.alerts)
            .iter()
            .filter(|a| a.ride_id == ride_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit as usize);
        alerts
    }

    /// Samples recorded for a ride, oldest first.
    pub fn location_samples(&self, ride_id: &str) -> Vec<LocationSample> {
        lock(&self.samples)
            .iter()
            .filter(|s| s.ride_id == ride_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParticipantStatus;
    use chrono::{Duration, Utc};

    fn participant(ride: &str, user: &str, status: ParticipantStatus) -> Participant {
        Participant {
            ride_id: ride.to_string(),
            user_id: user.to_string(),
            status,
        }
    }

    #[test]
    fn test_accepted_filter() {
        let store = MemoryStore::new();
        store
            .upsert_participant(&participant("r1", "b", ParticipantStatus::Accepted))
            .unwrap();
        store
            .upsert_participant(&participant("r1", "a", ParticipantStatus::Accepted))
            .unwrap();
        store
            .upsert_participant(&participant("r1", "c", ParticipantStatus::Pending))
            .unwrap();
        store
            .upsert_participant(&participant("r2", "d", ParticipantStatus::Accepted))
            .unwrap();

        let users: Vec<String> = store
            .get_accepted_participants("r1")
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(users, vec!["a", "b"]);
    }

    #[test]
    fn test_fail_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let err = store
            .upsert_participant(&participant("r1", "a", ParticipantStatus::Accepted))
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert!(store.get_participant("r1", "a").is_none());

        store.set_fail_writes(false);
        assert!(store
            .upsert_participant(&participant("r1", "a", ParticipantStatus::Accepted))
            .is_ok());
    }

    #[test]
    fn test_recent_alerts_newest_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (i, user) in ["a", "b", "c"].iter().enumerate() {
            store
                .write_drift_alert(&DriftAlert {
                    ride_id: "r1".to_string(),
                    user_id: user.to_string(),
                    distance_km: 3.0,
                    max_allowed_km: 2.0,
                    latitude: 0.0,
                    longitude: 0.0,
                    created_at: now + Duration::seconds(i as i64),
                })
                .unwrap();
        }

        let recent = store.get_recent_drift_alerts("r1", 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_id, "c");
        assert_eq!(recent[1].user_id, "b");
    }
}

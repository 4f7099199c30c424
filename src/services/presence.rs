// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Join/leave announcements on top of the connection registry.

use crate::models::ServerMessage;
use crate::services::registry::{
    BroadcastReport, ConnectionHandle, ConnectionId, ConnectionRegistry, Departure,
};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone)]
pub struct PresenceNotifier {
    registry: Arc<ConnectionRegistry>,
}

impl PresenceNotifier {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register a connection and tell the rest of the ride.
    pub fn join(&self, handle: ConnectionHandle, user_id: &str, ride_id: &str) -> ConnectionId {
        let id = self.registry.connect(handle, user_id, ride_id);

        let active_users: Vec<String> = self.registry.active_users(ride_id).into_iter().collect();
        let report = self.registry.broadcast_to_ride(
            ride_id,
            ServerMessage::ParticipantJoined {
                user_id: user_id.to_string(),
                total_participants: active_users.len(),
                active_users,
                timestamp: Utc::now(),
            },
            Some(user_id),
        );
        self.announce_departures(report.departures);

        id
    }

    /// Remove a connection and, if it was the user's last, tell the ride.
    ///
    /// Safe to call more than once.
    pub fn leave(&self, connection_id: ConnectionId) -> Option<Departure> {
        let departure = self.registry.disconnect(connection_id)?;
        self.announce_departures(vec![departure.clone()]);
        Some(departure)
    }

    /// Broadcast, then announce anyone reaped along the way.
    pub fn broadcast(
        &self,
        ride_id: &str,
        message: ServerMessage,
        exclude_user: Option<&str>,
    ) -> BroadcastReport {
        let report = self.registry.broadcast_to_ride(ride_id, message, exclude_user);
        self.announce_departures(report.departures.clone());
        report
    }

    /// Current members of a ride, sorted.
    pub fn roster(&self, ride_id: &str) -> Vec<String> {
        self.registry.active_users(ride_id).into_iter().collect()
    }

    /// Announce departures until no announcement causes further reaping.
    pub fn announce_departures(&self, departures: Vec<Departure>) {
        let mut pending: VecDeque<Departure> = departures.into();

        while let Some(departure) = pending.pop_front() {
            if !departure.user_left {
                continue;
            }

            let active_users = self.roster(&departure.ride_id);
            if active_users.is_empty() {
                continue;
            }

            let report = self.registry.broadcast_to_ride(
                &departure.ride_id,
                ServerMessage::ParticipantLeft {
                    user_id: departure.user_id.clone(),
                    total_participants: active_users.len(),
                    active_users,
                    timestamp: Utc::now(),
                },
                None,
            );
            pending.extend(report.departures);
        }
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Ride participant membership record.

use serde::{Deserialize, Serialize};

/// Invitation / membership status of a user on a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

/// Stored at `ride_participants/{ride_id}_{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub ride_id: String,
    pub user_id: String,
    pub status: ParticipantStatus,
}

impl Participant {
    pub fn document_id(&self) -> String {
        participant_document_id(&self.ride_id, &self.user_id)
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ParticipantStatus::Accepted
    }
}

/// Document ID for a (ride, user) membership record.
pub fn participant_document_id(ride_id: &str, user_id: &str) -> String {
    format!("{}_{}", ride_id, user_id)
}

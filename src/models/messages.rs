// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Live-channel wire messages.
//!
//! Every frame is a JSON object tagged by `type`. Timestamps are UTC RFC 3339.

use crate::models::DriftAlert;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages a client may send on a ride channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    LocationUpdate {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        accuracy: Option<f64>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    Ping,
}

/// Why an inbound frame could not be turned into a [`ClientMessage`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid {kind} message: {reason}")]
    InvalidFields { kind: String, reason: String },
}

impl ClientMessage {
    /// Decode a text frame.
    ///
    /// Unknown types are reported separately from malformed payloads so the
    /// caller can echo the offending type back.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| DecodeError::Malformed("missing \"type\" field".to_string()))?
            .to_string();

        match kind.as_str() {
            "location_update" | "ping" => {
                serde_json::from_value(value).map_err(|e| DecodeError::InvalidFields {
                    kind,
                    reason: e.to_string(),
                })
            }
            _ => Err(DecodeError::UnknownType(kind)),
        }
    }
}

/// One entry of a `drift_alert` broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftAlertPayload {
    pub user_id: String,
    /// Kilometers from the group centroid, rounded to 2 decimals
    pub distance_from_group: f64,
    pub max_allowed_distance: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<&DriftAlert> for DriftAlertPayload {
    fn from(alert: &DriftAlert) -> Self {
        Self {
            user_id: alert.user_id.clone(),
            distance_from_group: (alert.distance_km * 100.0).round() / 100.0,
            max_allowed_distance: alert.max_allowed_km,
            latitude: alert.latitude,
            longitude: alert.longitude,
            timestamp: alert.created_at,
        }
    }
}

/// Messages the server pushes to ride channel members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished {
        user_id: String,
        ride_id: String,
        active_users: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    LocationUpdate {
        user_id: String,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    DriftAlert {
        alerts: Vec<DriftAlertPayload>,
        timestamp: DateTime<Utc>,
    },
    ParticipantJoined {
        user_id: String,
        total_participants: usize,
        active_users: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    ParticipantLeft {
        user_id: String,
        total_participants: usize,
        active_users: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn pong() -> Self {
        ServerMessage::Pong {
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// The `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::ConnectionEstablished { .. } => "connection_established",
            ServerMessage::LocationUpdate { .. } => "location_update",
            ServerMessage::DriftAlert { .. } => "drift_alert",
            ServerMessage::ParticipantJoined { .. } => "participant_joined",
            ServerMessage::ParticipantLeft { .. } => "participant_left",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Error { .. } => "error",
        }
    }
}

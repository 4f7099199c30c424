// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod drift;
pub mod location;
pub mod messages;
pub mod participant;

pub use drift::DriftAlert;
pub use location::{Coordinates, LocationSample};
pub use messages::{ClientMessage, DriftAlertPayload, ServerMessage};
pub use participant::{Participant, ParticipantStatus};

/// Ride identifier (opaque string, UUID in practice).
pub type RideId = String;

/// User identifier (opaque string, UUID in practice).
pub type UserId = String;

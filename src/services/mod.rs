// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod cache;
pub mod distance;
pub mod drift;
pub mod ingest;
pub mod presence;
pub mod registry;
pub mod session;

pub use auth::{AuthError, AuthUser, TokenVerifier};
pub use cache::{CacheError, CacheService};
pub use drift::DriftDetector;
pub use ingest::{IngestOutcome, LocationIngest, LocationInput};
pub use presence::PresenceNotifier;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, Outbound};

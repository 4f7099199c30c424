// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Transport-independent live session.
//!
//! A transport backend supplies a stream of inbound frames and the handle of
//! its outbound queue; [`run_session`] does authorization, registration,
//! inbound dispatch and cleanup.

use crate::error::AppError;
use crate::models::messages::DecodeError;
use crate::models::{ClientMessage, ServerMessage};
use crate::services::auth::AuthUser;
use crate::services::ingest::LocationInput;
use crate::services::presence::PresenceNotifier;
use crate::services::registry::{CloseReason, ConnectionHandle, ConnectionId, ConnectionState};
use crate::AppState;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;

/// One frame read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    /// Peer closed cleanly.
    Close,
    /// Binary, ping/pong and other control frames.
    Other,
}

#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Who is connecting to what.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub ride_id: String,
    pub token: Option<String>,
}

/// Removes the connection from the registry when the session ends, however
/// it ends.
struct ConnectionGuard {
    presence: PresenceNotifier,
    connection_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Some(info) = self.presence.registry().connection(self.connection_id) {
            let duration_secs = (Utc::now() - info.established_at).num_seconds();
            tracing::info!(
                connection_id = %self.connection_id,
                user_id = %info.user_id,
                ride_id = %info.ride_id,
                duration_secs,
                "Session closing"
            );
        }
        self.presence.leave(self.connection_id);
    }
}

/// Check the token and the ride membership.
pub async fn authorize(state: &AppState, request: &SessionRequest) -> Result<AuthUser, AppError> {
    let token = request.token.as_deref().ok_or(AppError::Unauthorized)?;
    let user = state.token_verifier.verify(token)?;

    if !state
        .db
        .is_accepted_participant(&request.ride_id, &user.user_id)
        .await?
    {
        return Err(AppError::Forbidden(format!(
            "not an accepted participant of ride {}",
            request.ride_id
        )));
    }

    Ok(user)
}

/// Drive one live connection to completion.
///
/// On authorization failure a policy-violation close is queued and the
/// registry is left untouched.
pub async fn run_session<S>(
    state: Arc<AppState>,
    request: SessionRequest,
    handle: ConnectionHandle,
    mut inbound: S,
) where
    S: Stream<Item = Result<InboundFrame, TransportError>> + Unpin,
{
    let ride_id = request.ride_id.as_str();

    let user = match authorize(&state, &request).await {
        Ok(user) => user,
        Err(e) => {
            // Never registered, so the connection ends where it started.
            let state = ConnectionState::Connecting;
            if e.is_authorization() {
                tracing::warn!(ride_id, ?state, error = %e, "Rejected live connection");
            } else {
                tracing::error!(ride_id, ?state, error = %e, "Could not authorize live connection");
            }
            let _ = handle.close(CloseReason::PolicyViolation);
            return;
        }
    };
    let user_id = user.user_id.as_str();

    let mut closing = handle.closing_signal();
    let connection_id = state.presence.join(handle.clone(), user_id, ride_id);
    let _guard = ConnectionGuard {
        presence: state.presence.clone(),
        connection_id,
    };

    let established = ServerMessage::ConnectionEstablished {
        user_id: user_id.to_string(),
        ride_id: ride_id.to_string(),
        active_users: state.presence.roster(ride_id),
        timestamp: Utc::now(),
    };
    if !reply(&handle, connection_id, established) {
        return;
    }

    loop {
        let frame = tokio::select! {
            frame = inbound.next() => frame,
            _ = closing.raised() => {
                tracing::info!(connection_id = %connection_id, user_id, ride_id, "Connection dropped by server");
                // Best effort: a full queue is usually why we are here.
                let _ = handle.close(CloseReason::Lagging);
                break;
            }
        };
        let Some(frame) = frame else {
            break;
        };

        let keep_going = match frame {
            Ok(InboundFrame::Text(text)) => {
                handle_text(&state, user_id, ride_id, &handle, connection_id, &text).await
            }
            Ok(InboundFrame::Close) => false,
            Ok(InboundFrame::Other) => true,
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, user_id, ride_id, error = %e, "Transport error");
                false
            }
        };

        if !keep_going || state.registry.connection_state(connection_id) != ConnectionState::Active {
            break;
        }
    }
}

/// Handle one text frame. Returns `false` if the session should end.
async fn handle_text(
    state: &AppState,
    user_id: &str,
    ride_id: &str,
    handle: &ConnectionHandle,
    connection_id: ConnectionId,
    text: &str,
) -> bool {
    let message = match ClientMessage::decode(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, error = %e, "Undecodable frame");
            let text = match &e {
                DecodeError::Malformed(_) => "Invalid JSON format".to_string(),
                _ => e.to_string(),
            };
            return reply(handle, connection_id, ServerMessage::error(text));
        }
    };

    match message {
        ClientMessage::Ping => reply(handle, connection_id, ServerMessage::pong()),
        ClientMessage::LocationUpdate {
            latitude,
            longitude,
            accuracy,
            timestamp,
        } => {
            let input = LocationInput {
                latitude,
                longitude,
                accuracy,
                timestamp,
            };
            match state.ingest.ingest(user_id, ride_id, input).await {
                Ok(_) => true,
                Err(AppError::Validation(msg)) => {
                    reply(handle, connection_id, ServerMessage::error(msg))
                }
                Err(_) => reply(
                    handle,
                    connection_id,
                    ServerMessage::error("Failed to update location"),
                ),
            }
        }
    }
}

/// Send directly to this connection. A failed send ends the session.
fn reply(handle: &ConnectionHandle, connection_id: ConnectionId, message: ServerMessage) -> bool {
    match handle.send(Arc::new(message)) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "Direct send failed");
            false
        }
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live connection registry.
//!
//! Owns every ride channel's membership. Two indices are kept:
//! - `rides`: ride ID → user ID → connection ID → outbound handle
//! - `connections`: connection ID → (user ID, ride ID), for O(1) disconnect
//!
//! Membership mutations for one ride run under that ride's `DashMap` shard
//! lock, so connect/disconnect/reap for a ride are serialized while other
//! rides proceed in parallel. Lock order is always `rides` then
//! `connections`; nothing holds a `connections` guard while touching `rides`.
//!
//! Sends never happen under a ride lock: handles are snapshotted, the lock is
//! released, then each handle gets a non-blocking `try_send`.

use crate::models::ServerMessage;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Process-unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Lifecycle of one connection.
///
/// The registry only ever stores `Active` or `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport is open but authorization has not finished. Held by the
    /// session, never by the registry.
    Connecting,
    Active,
    /// A send failed; removal is in progress.
    Closing,
    /// Not in the registry.
    Closed,
}

/// Reason a transport is being closed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Authorization failed (WebSocket close code 1008).
    PolicyViolation,
    /// Dropped by the server after a failed send (1013, try again later).
    Lagging,
}

impl CloseReason {
    pub fn code(self) -> u16 {
        match self {
            CloseReason::PolicyViolation => 1008,
            CloseReason::Lagging => 1013,
        }
    }
}

/// Item on a connection's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(Arc<ServerMessage>),
    Close(CloseReason),
}

/// Per-send failure. Either way the peer is treated as gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("outbound queue full")]
    Full,

    #[error("connection closed")]
    Closed,
}

impl<T> From<mpsc::error::TrySendError<T>> for SendError {
    fn from(err: mpsc::error::TrySendError<T>) -> Self {
        match err {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        }
    }
}

/// Sending side of one transport session's bounded outbound queue.
///
/// Besides the queue, clones share a closing flag the registry raises when it
/// drops the connection. The queue may be full at that point, so the flag is
/// how the session and writer learn they must stop.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<Outbound>,
    closing: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        let (closing, _) = watch::channel(false);
        Self {
            tx,
            closing: Arc::new(closing),
        }
    }

    /// Create a handle and the receiver the transport writer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Raise the closing flag. Idempotent.
    pub fn mark_closing(&self) {
        self.closing.send_replace(true);
    }

    pub fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    /// A listener for the closing flag. Holding it does not keep the queue open.
    pub fn closing_signal(&self) -> ClosingSignal {
        ClosingSignal {
            rx: self.closing.subscribe(),
        }
    }

    /// Enqueue a message without waiting.
    pub fn send(&self, message: Arc<ServerMessage>) -> Result<(), SendError> {
        self.tx.try_send(Outbound::Message(message))?;
        Ok(())
    }

    /// Ask the writer to close the transport.
    pub fn close(&self, reason: CloseReason) -> Result<(), SendError> {
        self.tx.try_send(Outbound::Close(reason))?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Resolves once the connection's closing flag is raised.
#[derive(Debug, Clone)]
pub struct ClosingSignal {
    rx: watch::Receiver<bool>,
}

impl ClosingSignal {
    /// Wait for the flag. If every handle is dropped without raising it,
    /// this never resolves.
    pub async fn raised(&mut self) {
        if self.rx.wait_for(|closing| *closing).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Snapshot of a registered connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub user_id: String,
    pub ride_id: String,
    pub established_at: DateTime<Utc>,
    pub state: ConnectionState,
}

/// What a disconnect changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub ride_id: String,
    /// The user's last connection to the ride closed.
    pub user_left: bool,
    /// Users still present after the disconnect.
    pub remaining_users: usize,
}

/// Aggregated result of a fan-out.
#[derive(Debug, Default, Clone)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
    /// Connections reaped because their send failed.
    pub departures: Vec<Departure>,
}

#[derive(Default)]
struct RideChannel {
    members: HashMap<String, HashMap<ConnectionId, ConnectionHandle>>,
}

impl RideChannel {
    fn connection_count(&self) -> usize {
        self.members.values().map(HashMap::len).sum()
    }
}

/// Registry of live connections for all rides.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    rides: DashMap<String, RideChannel>,
    connections: DashMap<ConnectionId, ConnectionInfo>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, creating the ride channel on first use.
    pub fn connect(&self, handle: ConnectionHandle, user_id: &str, ride_id: &str) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);

        let mut channel = self.rides.entry(ride_id.to_string()).or_default();
        channel
            .members
            .entry(user_id.to_string())
            .or_default()
            .insert(id, handle);
        // Index while the ride shard is still held.
        self.connections.insert(
            id,
            ConnectionInfo {
                user_id: user_id.to_string(),
                ride_id: ride_id.to_string(),
                established_at: Utc::now(),
                state: ConnectionState::Active,
            },
        );
        let users = channel.members.len();
        let connections = channel.connection_count();
        drop(channel);

        tracing::info!(
            connection_id = %id,
            user_id,
            ride_id,
            users,
            connections,
            "Connection registered"
        );
        id
    }

    /// Remove a connection. Returns `None` if it was already gone.
    ///
    /// The reverse index entry is dropped while the ride shard is held, so a
    /// connection reported `Closed` is never still in a membership set.
    pub fn disconnect(&self, id: ConnectionId) -> Option<Departure> {
        let ride_id = self.connections.get(&id)?.ride_id.clone();

        let mut user_left = false;
        let mut remaining_users = 0;

        let info = match self.rides.entry(ride_id) {
            Entry::Occupied(mut ride) => {
                // A concurrent disconnect may have won while we waited.
                let (_, info) = self.connections.remove(&id)?;
                let channel = ride.get_mut();
                if let Some(conns) = channel.members.get_mut(&info.user_id) {
                    conns.remove(&id);
                    if conns.is_empty() {
                        channel.members.remove(&info.user_id);
                        user_left = true;
                    }
                }
                remaining_users = channel.members.len();
                if channel.members.is_empty() {
                    ride.remove();
                }
                info
            }
            Entry::Vacant(_) => {
                let (_, info) = self.connections.remove(&id)?;
                tracing::warn!(
                    connection_id = %id,
                    ride_id = %info.ride_id,
                    "Indexed connection had no ride channel"
                );
                info
            }
        };

        tracing::info!(
            connection_id = %id,
            user_id = %info.user_id,
            ride_id = %info.ride_id,
            user_left,
            remaining_users,
            "Connection removed"
        );

        Some(Departure {
            connection_id: id,
            user_id: info.user_id,
            ride_id: info.ride_id,
            user_left,
            remaining_users,
        })
    }

    /// Deliver to every connection of every member, optionally skipping one user.
    pub fn broadcast_to_ride(
        &self,
        ride_id: &str,
        message: ServerMessage,
        exclude_user: Option<&str>,
    ) -> BroadcastReport {
        let targets = self.snapshot(ride_id, |user| Some(user) != exclude_user);
        self.deliver(ride_id, targets, Arc::new(message))
    }

    /// Deliver to all of one user's connections on a ride.
    pub fn send_to_user(&self, ride_id: &str, user_id: &str, message: ServerMessage) -> BroadcastReport {
        let targets = self.snapshot(ride_id, |user| user == user_id);
        self.deliver(ride_id, targets, Arc::new(message))
    }

    /// Users with at least one open connection to the ride.
    pub fn active_users(&self, ride_id: &str) -> BTreeSet<String> {
        self.rides
            .get(ride_id)
            .map(|channel| channel.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Open connections to the ride (a user on two devices counts twice).
    pub fn connection_count(&self, ride_id: &str) -> usize {
        self.rides
            .get(ride_id)
            .map(|channel| channel.connection_count())
            .unwrap_or(0)
    }

    /// Number of ride channels currently live.
    pub fn ride_count(&self) -> usize {
        self.rides.len()
    }

    pub fn connection_state(&self, id: ConnectionId) -> ConnectionState {
        self.connections
            .get(&id)
            .map(|info| info.state)
            .unwrap_or(ConnectionState::Closed)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.get(&id).map(|info| info.clone())
    }

    fn snapshot(
        &self,
        ride_id: &str,
        include: impl Fn(&str) -> bool,
    ) -> Vec<(ConnectionId, ConnectionHandle)> {
        let Some(channel) = self.rides.get(ride_id) else {
            return Vec::new();
        };
        channel
            .members
            .iter()
            .filter(|(user, _)| include(user.as_str()))
            .flat_map(|(_, conns)| conns.iter().map(|(id, handle)| (*id, handle.clone())))
            .collect()
    }

    fn deliver(
        &self,
        ride_id: &str,
        targets: Vec<(ConnectionId, ConnectionHandle)>,
        message: Arc<ServerMessage>,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();

        for (id, handle) in &targets {
            let id = *id;
            match handle.send(Arc::clone(&message)) {
                Ok(()) => report.sent += 1,
                Err(err) => {
                    tracing::warn!(
                        connection_id = %id,
                        ride_id,
                        kind = message.kind(),
                        error = %err,
                        "Send failed, dropping connection"
                    );
                    report.failed += 1;
                    handle.mark_closing();
                    dead.push(id);
                }
            }
        }

        // Reap after the fan-out so one dead peer never blocks the others.
        for id in dead {
            if let Some(mut info) = self.connections.get_mut(&id) {
                info.state = ConnectionState::Closing;
            }
            if let Some(departure) = self.disconnect(id) {
                report.departures.push(departure);
            }
        }

        tracing::debug!(
            ride_id,
            kind = message.kind(),
            sent = report.sent,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }
}

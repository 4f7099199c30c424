// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! WebSocket transport for live ride channels.

use crate::middleware::auth::bearer_token;
use crate::services::registry::{CloseReason, ConnectionHandle, Outbound};
use crate::services::session::{run_session, InboundFrame, SessionRequest, TransportError};
use crate::AppState;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// How long the writer gets to flush after the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws/rides/{ride_id}", get(ride_socket))
}

#[derive(Deserialize)]
struct SocketParams {
    token: Option<String>,
}

/// Upgrade to a WebSocket. Authorization happens after the upgrade so the
/// client gets a proper close code.
async fn ride_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Query(params): Query<SocketParams>,
    headers: HeaderMap,
) -> Response {
    let token = params.token.or_else(|| bearer_token(&headers));
    let request = SessionRequest { ride_id, token };
    ws.on_upgrade(move |socket| serve_socket(socket, state, request))
}

async fn serve_socket(socket: WebSocket, state: Arc<AppState>, request: SessionRequest) {
    let (mut sink, stream) = socket.split();
    let (handle, mut rx) = ConnectionHandle::channel(state.config.outbound_queue_capacity);

    let mut closing = handle.closing_signal();

    let writer = tokio::spawn(async move {
        loop {
            let outbound = tokio::select! {
                biased;
                _ = closing.raised() => Outbound::Close(CloseReason::Lagging),
                outbound = rx.recv() => match outbound {
                    Some(outbound) => outbound,
                    None => break,
                },
            };

            match outbound {
                Outbound::Message(message) => {
                    let text = match serde_json::to_string(&*message) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode outbound message");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close(reason) => {
                    let frame = CloseFrame {
                        code: reason.code(),
                        reason: "".into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
        let _ = sink.close().await;
    });

    let inbound = stream.map(|frame| match frame {
        Ok(Message::Text(text)) => Ok(InboundFrame::Text(text.as_str().to_string())),
        Ok(Message::Close(_)) => Ok(InboundFrame::Close),
        Ok(_) => Ok(InboundFrame::Other),
        Err(e) => Err(TransportError(e.to_string())),
    });

    run_session(state, request, handle, inbound).await;

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        tracing::debug!("WebSocket writer did not finish in time");
    }
}

//! `WebSocket` handlers for both sides of the relay.
//!
//! Publishers (the desktop app) connect to `GET /ingest/{api_key}`,
//! prove their protocol version, then stream the canonical graph: a
//! full snapshot first, one change record per mutation after. Overlays
//! connect to `GET /overlay/{app_key}` and receive the public
//! projection the same way: scrubbed snapshot, then the live stream.
//! Overlays may also submit `config-update` frames, which are applied
//! to the room replica and routed back to the publisher.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use stagelink_types::{ConnectionState, PROTOCOL_VERSION, SyncFrame};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::appkey;
use crate::state::{AppState, Room};

/// How long a publisher gets to open with a handshake frame.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upgrade `GET /ingest/{api_key}` and register the app's canonical
/// feed. The room is addressed by the digest of the key, so overlays
/// never learn the key itself.
pub async fn ingest(
    Path(api_key): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Ok(api_key) = api_key.parse::<Uuid>() else {
        debug!("ingest refused, malformed api key");
        return StatusCode::BAD_REQUEST.into_response();
    };
    let app_key = appkey::derive(&api_key);
    let room = state.room_for_publisher(app_key).await;
    ws.on_upgrade(move |socket| handle_publisher(socket, room)).into_response()
}

/// Upgrade `GET /overlay/{app_key}` and stream the public projection.
/// Keys that no publisher has ever opened a room under are refused.
pub async fn overlay(
    Path(app_key): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(room) = state.room(&app_key).await else {
        debug!(app_key = %app_key, "overlay refused, unknown app key");
        return StatusCode::NOT_FOUND.into_response();
    };
    ws.on_upgrade(move |socket| handle_overlay(socket, room)).into_response()
}

async fn handle_publisher(mut socket: WebSocket, room: Arc<Room>) {
    let Some(version) = await_handshake(&mut socket).await else {
        refuse(socket, &room, "no handshake before the deadline").await;
        return;
    };
    if version != PROTOCOL_VERSION {
        refuse(socket, &room, "protocol version mismatch").await;
        return;
    }
    if !room.claim_publisher() {
        refuse(socket, &room, "room already has a live publisher").await;
        return;
    }

    let (to_app, from_server) = mpsc::unbounded_channel();
    room.set_backchannel(to_app).await;
    info!(app_key = %room.app_key, "publisher connected");

    run_publisher(&mut socket, &room, from_server).await;

    room.clear_backchannel().await;
    room.release_publisher();
    info!(app_key = %room.app_key, "publisher disconnected");
}

/// Publisher main loop: ack the handshake, then interleave inbound
/// frames with backchannel config edits until either side goes away.
async fn run_publisher(
    socket: &mut WebSocket,
    room: &Room,
    mut from_server: mpsc::UnboundedReceiver<SyncFrame>,
) {
    let ack = SyncFrame::HandshakeAck {
        connection_state: ConnectionState::Connecting,
        version: PROTOCOL_VERSION,
    };
    if !send_frame(socket, &ack).await {
        return;
    }

    loop {
        tokio::select! {
            forwarded = from_server.recv() => {
                let Some(frame) = forwarded else { break };
                if !send_frame(socket, &frame).await {
                    break;
                }
            }
            received = socket.recv() => {
                match received {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_publisher_frame(socket, room, &text).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(app_key = %room.app_key, "publisher closed the socket");
                        break;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_) | Message::Binary(_))) => {}
                    Some(Err(err)) => {
                        debug!(app_key = %room.app_key, error = %err, "publisher socket error");
                        break;
                    }
                }
            }
        }
    }
}

/// Dispatch one decoded publisher frame. Returns `false` when the
/// session should end.
async fn handle_publisher_frame(socket: &mut WebSocket, room: &Room, text: &str) -> bool {
    let Some(frame) = decode_frame(text) else {
        return true;
    };
    match frame {
        SyncFrame::StoreInit { snapshot } => {
            if let Err(err) = room.reinitialize(&snapshot).await {
                warn!(app_key = %room.app_key, error = %err, "canonical snapshot rejected");
                return false;
            }
            info!(app_key = %room.app_key, "canonical snapshot received");
            true
        }
        SyncFrame::StoreUpdate { envelope } => {
            room.ingest_update(envelope).await;
            true
        }
        SyncFrame::LatencyPing { nonce } => {
            send_frame(socket, &SyncFrame::LatencyPong { nonce }).await
        }
        SyncFrame::ConfigUpdate { .. }
        | SyncFrame::Handshake { .. }
        | SyncFrame::HandshakeAck { .. }
        | SyncFrame::LatencyPong { .. } => {
            debug!(app_key = %room.app_key, "unexpected frame from publisher");
            true
        }
    }
}

async fn handle_overlay(mut socket: WebSocket, room: Arc<Room>) {
    debug!(app_key = %room.app_key, "overlay connected");

    let Some(mut frames) = send_snapshot(&mut socket, &room).await else {
        return;
    };

    loop {
        tokio::select! {
            result = frames.recv() => {
                match result {
                    Ok(frame) => {
                        if !send_frame(&mut socket, &frame).await {
                            debug!(app_key = %room.app_key, "overlay disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(app_key = %room.app_key, skipped, "overlay lagged, resyncing");
                        let Some(fresh) = send_snapshot(&mut socket, &room).await else {
                            return;
                        };
                        frames = fresh;
                    }
                    Err(RecvError::Closed) => {
                        debug!(app_key = %room.app_key, "room closed, shutting overlay down");
                        return;
                    }
                }
            }
            received = socket.recv() => {
                match received {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(SyncFrame::ConfigUpdate { envelope }) = decode_frame(&text) {
                            room.relay_config(envelope).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(app_key = %room.app_key, "overlay disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Pong(_) | Message::Binary(_))) => {}
                    Some(Err(err)) => {
                        debug!(app_key = %room.app_key, error = %err, "overlay socket error");
                        return;
                    }
                }
            }
        }
    }
}

/// Hydrate (or resync) an overlay: scrubbed snapshot first, and a
/// receiver that picks up exactly where the snapshot left off. `None`
/// means the socket is gone.
async fn send_snapshot(
    socket: &mut WebSocket,
    room: &Room,
) -> Option<tokio::sync::broadcast::Receiver<SyncFrame>> {
    let (snapshot, frames) = match room.snapshot_and_subscribe().await {
        Ok(pair) => pair,
        Err(err) => {
            warn!(app_key = %room.app_key, error = %err, "overlay snapshot failed");
            return None;
        }
    };
    if send_frame(socket, &SyncFrame::StoreInit { snapshot }).await {
        Some(frames)
    } else {
        None
    }
}

/// First frame must be a handshake, within [`HANDSHAKE_TIMEOUT`].
async fn await_handshake(socket: &mut WebSocket) -> Option<u32> {
    let received = tokio::time::timeout(HANDSHAKE_TIMEOUT, socket.recv())
        .await
        .ok()?;
    let message = received?.ok()?;
    let Message::Text(text) = message else {
        return None;
    };
    let SyncFrame::Handshake { version } = decode_frame(&text)? else {
        return None;
    };
    Some(version)
}

/// Turn a publisher away with a terminal ack.
async fn refuse(mut socket: WebSocket, room: &Room, reason: &str) {
    warn!(app_key = %room.app_key, reason, "publisher refused");
    let ack = SyncFrame::HandshakeAck {
        connection_state: ConnectionState::Disconnected,
        version: PROTOCOL_VERSION,
    };
    if let Some(text) = encode_frame(&ack) {
        drop(socket.send(Message::Text(text.into())).await);
    }
    drop(socket.send(Message::Close(None)).await);
}

/// Send one frame; `false` means the socket is gone.
async fn send_frame(socket: &mut WebSocket, frame: &SyncFrame) -> bool {
    let Some(text) = encode_frame(frame) else {
        return true;
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

fn encode_frame(frame: &SyncFrame) -> Option<String> {
    match serde_json::to_string(frame) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(error = %err, "failed to serialize frame");
            None
        }
    }
}

fn decode_frame(text: &str) -> Option<SyncFrame> {
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(error = %err, "malformed frame");
            None
        }
    }
}

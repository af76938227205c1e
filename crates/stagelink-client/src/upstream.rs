//! Canonical-side relay adapter.
//!
//! [`spawn_upstream`] pushes one store's session to the relay: version
//! handshake, full snapshot, then every change record as it is emitted.
//! Remote config edits arrive on the same socket as `config-update`
//! frames and are applied under the upstream origin label, so they
//! cascade to local windows without echoing back to the relay. The
//! connection's lifecycle is written into the replicated graph itself
//! (`cloud.connectionState`, `cloud.latencyMs`), which is how the UI
//! shows sync health.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use stagelink_store::{ApplyOutcome, SharedStore};
use stagelink_types::{ChangeOp, ConnectionState, Envelope, PROTOCOL_VERSION, SyncFrame, WireValue};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::socket::{WsStream, next_backoff, recv_frame, send_frame, with_jitter};

/// Origin label the store applies relay-sent edits under.
const UPSTREAM_LABEL: &str = "upstream";

/// How long to wait for the relay's handshake verdict.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Re-check cadence while cloud sync is switched off.
const DISABLED_POLL: Duration = Duration::from_secs(1);

/// Where and how the publisher connects.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the relay, e.g. `ws://localhost:8080`.
    pub url: String,
    /// Delay before the first reconnect attempt.
    pub initial_backoff: Duration,
    /// Ceiling for the exponential backoff schedule.
    pub max_backoff: Duration,
    /// Interval between latency probes.
    pub ping_interval: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::from("ws://127.0.0.1:8080"),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            ping_interval: Duration::from_secs(8),
        }
    }
}

/// Spawn the upstream publisher loop for a store.
///
/// The task reconnects with jittered exponential backoff for as long
/// as `config.enableCloud` is set, idles while it is not, and runs
/// until aborted. The store's API key is re-read on every attempt, so
/// a key minted after spawn is picked up without a restart.
pub fn spawn_upstream(store: SharedStore, config: UpstreamConfig) -> JoinHandle<()> {
    tokio::spawn(run_upstream(store, config))
}

async fn run_upstream(store: SharedStore, config: UpstreamConfig) {
    let mut backoff = config.initial_backoff;
    loop {
        let enabled = store.read().await.session().config.enable_cloud;
        if !enabled {
            tokio::time::sleep(DISABLED_POLL).await;
            continue;
        }

        store.write().await.set_connection_state(ConnectionState::Connecting);

        match run_session(&store, &config).await {
            Ok(()) => {
                backoff = config.initial_backoff;
            }
            Err(err) => {
                debug!(error = %err, "upstream session failed");
                backoff = next_backoff(backoff, config.max_backoff);
            }
        }

        {
            let mut guard = store.write().await;
            guard.set_connection_state(ConnectionState::Disconnected);
            guard.set_latency(None);
        }

        tokio::time::sleep(with_jitter(backoff)).await;
    }
}

/// One connected session: handshake, snapshot, then the live stream.
/// `Ok` means the session reached sync before ending; errors before
/// that point grow the caller's backoff.
async fn run_session(store: &SharedStore, config: &UpstreamConfig) -> Result<(), ClientError> {
    let api_key = store.read().await.session().config.api_key;
    let url = format!("{}/ingest/{api_key}", config.url.trim_end_matches('/'));
    let (mut socket, _response) = connect_async(&url)
        .await
        .map_err(|e| ClientError::Connect(e.to_string()))?;

    handshake(&mut socket).await?;

    // Snapshot and stream under one lock so they tile exactly.
    let (snapshot, mut updates) = {
        let mut guard = store.write().await;
        let updates = guard.subscribe(UPSTREAM_LABEL, None);
        let snapshot = guard.snapshot()?;
        (snapshot, updates)
    };
    send_frame(&mut socket, &SyncFrame::StoreInit { snapshot }).await?;

    store.write().await.set_connection_state(ConnectionState::Synced);
    info!("upstream synced");

    let mut probes = tokio::time::interval(config.ping_interval);
    probes.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut next_nonce: u64 = 0;
    let mut in_flight: Option<(u64, Instant)> = None;

    loop {
        tokio::select! {
            envelope = updates.recv() => {
                let Some(envelope) = envelope else {
                    // The store's relay is gone; nothing left to publish.
                    return Ok(());
                };
                let toggled_off = is_cloud_toggle_off(&envelope);
                if let Err(err) = send_frame(&mut socket, &SyncFrame::StoreUpdate { envelope }).await {
                    debug!(error = %err, "upstream send failed");
                    return Ok(());
                }
                if toggled_off {
                    info!("cloud sync disabled, closing upstream");
                    drop(socket.close(None).await);
                    return Ok(());
                }
            }
            _ = probes.tick() => {
                next_nonce = next_nonce.wrapping_add(1);
                in_flight = Some((next_nonce, Instant::now()));
                if let Err(err) = send_frame(&mut socket, &SyncFrame::LatencyPing { nonce: next_nonce }).await {
                    debug!(error = %err, "latency probe failed");
                    return Ok(());
                }
            }
            message = futures::StreamExt::next(&mut socket) => {
                match message {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_relay_frame(store, &text, &mut in_flight).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        debug!("upstream closed by the relay");
                        return Ok(());
                    }
                    Some(Ok(
                        WsMessage::Binary(_)
                        | WsMessage::Ping(_)
                        | WsMessage::Pong(_)
                        | WsMessage::Frame(_),
                    )) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "upstream socket error");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Send our handshake and wait for the relay's verdict. Anything other
/// than `Connecting` ends the session.
async fn handshake(socket: &mut WsStream) -> Result<(), ClientError> {
    send_frame(
        socket,
        &SyncFrame::Handshake {
            version: PROTOCOL_VERSION,
        },
    )
    .await?;

    let ack = tokio::time::timeout(HANDSHAKE_TIMEOUT, recv_frame(socket))
        .await
        .map_err(|e| ClientError::Handshake(format!("no ack before the deadline: {e}")))??;

    match ack {
        SyncFrame::HandshakeAck {
            connection_state: ConnectionState::Connecting,
            ..
        } => Ok(()),
        SyncFrame::HandshakeAck {
            connection_state,
            version,
        } => Err(ClientError::Handshake(format!(
            "refused as {connection_state:?} by relay protocol v{version}"
        ))),
        SyncFrame::StoreInit { .. }
        | SyncFrame::StoreUpdate { .. }
        | SyncFrame::ConfigUpdate { .. }
        | SyncFrame::Handshake { .. }
        | SyncFrame::LatencyPing { .. }
        | SyncFrame::LatencyPong { .. } => {
            Err(ClientError::Handshake(String::from("expected an ack")))
        }
    }
}

/// Apply one relay-sent frame to the canonical store.
async fn handle_relay_frame(
    store: &SharedStore,
    text: &str,
    in_flight: &mut Option<(u64, Instant)>,
) {
    let Ok(frame) = serde_json::from_str::<SyncFrame>(text) else {
        warn!("malformed frame from relay");
        return;
    };
    match frame {
        SyncFrame::ConfigUpdate { envelope } => {
            let applied = store.write().await.apply_config_remote(UPSTREAM_LABEL, &envelope);
            match applied {
                Ok(ApplyOutcome::Applied) => {
                    debug!(path = %envelope.path, "remote config edit applied");
                }
                Ok(ApplyOutcome::Skipped) => {
                    debug!(path = %envelope.path, "remote config edit raced, skipped");
                }
                Err(err) => {
                    warn!(path = %envelope.path, error = %err, "remote config edit rejected");
                }
            }
        }
        SyncFrame::LatencyPong { nonce } => {
            let Some((expected, sent_at)) = in_flight.take() else {
                return;
            };
            if nonce != expected {
                *in_flight = Some((expected, sent_at));
                debug!(nonce, expected, "stale latency pong discarded");
                return;
            }
            let micros = i64::try_from(sent_at.elapsed().as_micros()).unwrap_or(i64::MAX);
            store.write().await.set_latency(Some(Decimal::new(micros, 3)));
        }
        SyncFrame::StoreInit { .. }
        | SyncFrame::StoreUpdate { .. }
        | SyncFrame::Handshake { .. }
        | SyncFrame::HandshakeAck { .. }
        | SyncFrame::LatencyPing { .. } => {
            debug!("unexpected frame from relay");
        }
    }
}

/// Whether a change record is the cloud-sync switch being turned off.
/// The record is still forwarded first, so the relay's replica agrees
/// the link is meant to be down.
fn is_cloud_toggle_off(envelope: &Envelope) -> bool {
    if envelope.path != "config" {
        return false;
    }
    matches!(
        &envelope.change,
        ChangeOp::Update { name, new_value }
            if name == "enableCloud" && *new_value == WireValue::Bool(false)
    )
}

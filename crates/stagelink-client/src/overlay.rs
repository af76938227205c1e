//! Replica-side relay adapter.
//!
//! [`spawn_overlay`] keeps a replica store converged on one app's
//! relayed session. Every connection starts with a `store-init`
//! snapshot that replaces the replica wholesale, followed by change
//! records applied in arrival order; records missed while offline are
//! never replayed, so a reconnect always hydrates fresh. Local edits
//! to the config subtree travel back up the same socket as
//! `config-update` frames, which is how overlay settings pages reach
//! the app that owns the canonical graph.

use std::time::Duration;

use stagelink_store::SharedStore;
use stagelink_types::{ConnectionState, SyncFrame};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::socket::{next_backoff, recv_frame, send_frame, with_jitter};

/// Origin label the replica applies relayed records under. The config
/// backchannel subscribes under the same label, so an applied record is
/// never echoed back to the relay it came from.
const OVERLAY_LABEL: &str = "relay";

/// Where and how a subscriber connects.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Base URL of the relay, e.g. `ws://localhost:8080`.
    pub url: String,
    /// Public key of the session to follow.
    pub app_key: String,
    /// Delay before the first reconnect attempt.
    pub initial_backoff: Duration,
    /// Ceiling for the exponential backoff schedule.
    pub max_backoff: Duration,
}

impl OverlayConfig {
    /// Configuration with the default backoff schedule.
    #[must_use]
    pub fn new(url: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            app_key: app_key.into(),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// A spawned subscriber: the driving task plus its link telemetry.
#[derive(Debug)]
pub struct OverlayHandle {
    /// The subscriber task. Abort it to stop following the session.
    pub task: JoinHandle<()>,
    /// This connection's own state. The replica's `cloud` subtree
    /// carries the app's relayed upstream health, not this link's, so
    /// the subscriber reports its lifecycle out of band.
    pub link: watch::Receiver<ConnectionState>,
}

/// Spawn the subscriber loop keeping a replica tiled against a relayed
/// session.
///
/// The task reconnects with jittered exponential backoff and runs until
/// aborted. A relay that does not know the app key yet (the app has not
/// connected since the relay started) refuses the upgrade, which lands
/// in the same backoff path until the session appears.
pub fn spawn_overlay(store: SharedStore, config: OverlayConfig) -> OverlayHandle {
    let (tx, link) = watch::channel(ConnectionState::Disconnected);
    let task = tokio::spawn(run_overlay(store, config, tx));
    OverlayHandle { task, link }
}

async fn run_overlay(
    store: SharedStore,
    config: OverlayConfig,
    link: watch::Sender<ConnectionState>,
) {
    let mut backoff = config.initial_backoff;
    loop {
        link.send_replace(ConnectionState::Connecting);

        match run_session(&store, &config, &link).await {
            Ok(()) => {
                backoff = config.initial_backoff;
            }
            Err(err) => {
                debug!(error = %err, "overlay session failed");
                backoff = next_backoff(backoff, config.max_backoff);
            }
        }

        link.send_replace(ConnectionState::Disconnected);
        tokio::time::sleep(with_jitter(backoff)).await;
    }
}

/// One connected session: hydrate from the opening snapshot, then apply
/// the live stream. `Ok` means the session reached sync before ending;
/// errors before that point grow the caller's backoff.
async fn run_session(
    store: &SharedStore,
    config: &OverlayConfig,
    link: &watch::Sender<ConnectionState>,
) -> Result<(), ClientError> {
    let url = format!(
        "{}/overlay/{}",
        config.url.trim_end_matches('/'),
        config.app_key
    );
    let (mut socket, _response) = connect_async(&url)
        .await
        .map_err(|e| ClientError::Connect(e.to_string()))?;

    // The relay speaks snapshot-first; anything else is a broken peer.
    let snapshot = match recv_frame(&mut socket).await? {
        SyncFrame::StoreInit { snapshot } => snapshot,
        SyncFrame::StoreUpdate { .. }
        | SyncFrame::ConfigUpdate { .. }
        | SyncFrame::Handshake { .. }
        | SyncFrame::HandshakeAck { .. }
        | SyncFrame::LatencyPing { .. }
        | SyncFrame::LatencyPong { .. } => {
            return Err(ClientError::Handshake(String::from("expected a snapshot")));
        }
    };

    let mut edits = {
        let mut guard = store.write().await;
        guard.hydrate(&snapshot)?;
        guard.subscribe(OVERLAY_LABEL, Some(String::from("config")))
    };

    link.send_replace(ConnectionState::Synced);
    info!(app_key = %config.app_key, "overlay synced");

    loop {
        tokio::select! {
            envelope = edits.recv() => {
                let Some(envelope) = envelope else {
                    // The store's relay is gone; nothing left to follow.
                    return Ok(());
                };
                if let Err(err) = send_frame(&mut socket, &SyncFrame::ConfigUpdate { envelope }).await {
                    debug!(error = %err, "config edit send failed");
                    return Ok(());
                }
            }
            frame = recv_frame(&mut socket) => {
                match frame {
                    Ok(frame) => handle_relay_frame(store, frame).await?,
                    Err(err) => {
                        debug!(error = %err, "overlay stream ended");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Apply one relay-sent frame to the replica. A mid-session snapshot
/// replaces the graph: the relay sends one whenever this subscriber
/// fell behind the broadcast or the app reconnected upstream.
async fn handle_relay_frame(store: &SharedStore, frame: SyncFrame) -> Result<(), ClientError> {
    match frame {
        SyncFrame::StoreInit { snapshot } => {
            store.write().await.hydrate(&snapshot)?;
            debug!("overlay rehydrated");
        }
        SyncFrame::StoreUpdate { envelope } => {
            let applied = store.write().await.apply_remote(OVERLAY_LABEL, &envelope);
            if let Err(err) = applied {
                warn!(path = %envelope.path, error = %err, "relayed record rejected");
            }
        }
        SyncFrame::ConfigUpdate { .. }
        | SyncFrame::Handshake { .. }
        | SyncFrame::HandshakeAck { .. }
        | SyncFrame::LatencyPing { .. }
        | SyncFrame::LatencyPong { .. } => {
            debug!("unexpected frame from relay");
        }
    }
    Ok(())
}

//! Shared relay state: one room per public app key.
//!
//! A [`Room`] is everything the relay knows about one installation. It
//! holds a server-side replica of the app's canonical graph, the
//! broadcast channel overlays subscribe to, and the backchannel used to
//! route overlay config edits to the app. Rooms are created the first
//! time a publisher connects and persist for the life of the process,
//! so overlays keep receiving the last-known state while the app is
//! offline.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use stagelink_store::{ApplyOutcome, CodecError, Store};
use stagelink_types::{ChangeOp, Envelope, SyncFrame, WireValue};
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, warn};

/// Capacity of the per-room frame channel.
///
/// An overlay that falls further behind than this receives
/// [`broadcast::error::RecvError::Lagged`] and is resynced from a
/// fresh snapshot instead of a replay.
const BROADCAST_CAPACITY: usize = 256;

/// Origin label the room replica applies publisher changes under.
const ORIGIN_PUBLISHER: &str = "publisher";

/// Origin label for overlay-submitted config edits.
const ORIGIN_OVERLAY: &str = "overlay";

/// Shared state for the relay, injected via Axum's `State` extractor.
#[derive(Debug, Default)]
pub struct AppState {
    /// Rooms keyed by public app key.
    rooms: RwLock<BTreeMap<String, Arc<Room>>>,
}

impl AppState {
    /// Fresh state with no rooms.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing room by public app key.
    pub async fn room(&self, app_key: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(app_key).cloned()
    }

    /// The room for a publisher, created on first contact.
    pub async fn room_for_publisher(&self, app_key: String) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;
        Arc::clone(
            rooms
                .entry(app_key.clone())
                .or_insert_with(|| Arc::new(Room::new(app_key))),
        )
    }

    /// Number of rooms a publisher has ever opened.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

/// Per-installation relay session.
#[derive(Debug)]
pub struct Room {
    /// Public key this room is addressed by.
    pub app_key: String,
    replica: RwLock<Store>,
    frames: broadcast::Sender<SyncFrame>,
    to_app: RwLock<Option<mpsc::UnboundedSender<SyncFrame>>>,
    publisher_connected: AtomicBool,
}

impl Room {
    fn new(app_key: String) -> Self {
        let (frames, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            app_key,
            replica: RwLock::new(Store::new()),
            frames,
            to_app: RwLock::new(None),
            publisher_connected: AtomicBool::new(false),
        }
    }

    /// Claim the room's single publisher slot. Returns `false` when an
    /// app is already streaming into this room.
    pub(crate) fn claim_publisher(&self) -> bool {
        self.publisher_connected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the publisher slot for the next connection.
    pub(crate) fn release_publisher(&self) {
        self.publisher_connected.store(false, Ordering::Release);
    }

    /// Subscribe to the room's frame stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncFrame> {
        self.frames.subscribe()
    }

    /// Replace the replica with a fresh canonical snapshot and push the
    /// scrubbed form to every overlay.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the snapshot does not decode through
    /// the root schema; the previous replica state is then unchanged.
    pub async fn reinitialize(&self, snapshot: &WireValue) -> Result<(), CodecError> {
        let mut replica = self.replica.write().await;
        replica.hydrate(snapshot)?;
        let scrubbed = replica.snapshot_scrubbed()?;
        self.broadcast(SyncFrame::StoreInit { snapshot: scrubbed });
        Ok(())
    }

    /// Apply one canonical change record and fan it out to overlays.
    ///
    /// The broadcast happens while the replica lock is still held, so a
    /// snapshot taken under the same lock tiles exactly against the
    /// stream. Changes that touch scrubbed state are applied but never
    /// forwarded; overlay replicas hold the scrubbed projection and
    /// must stay on it.
    pub(crate) async fn ingest_update(&self, envelope: Envelope) {
        let mut replica = self.replica.write().await;
        match replica.apply_remote(ORIGIN_PUBLISHER, &envelope) {
            Ok(ApplyOutcome::Applied) => {
                if is_private(&envelope) {
                    debug!(path = %envelope.path, "private change withheld from overlays");
                } else {
                    self.broadcast(SyncFrame::StoreUpdate { envelope });
                }
            }
            Ok(ApplyOutcome::Skipped) => {
                debug!(path = %envelope.path, "change raced a removal, not forwarded");
            }
            Err(err) => {
                warn!(
                    app_key = %self.app_key,
                    path = %envelope.path,
                    error = %err,
                    "malformed change record from publisher"
                );
            }
        }
    }

    /// Apply an overlay-submitted config edit and route it to the app.
    ///
    /// The edit is applied to the replica and broadcast so every overlay
    /// converges immediately; the app receives it as a `config-update`
    /// frame and will not echo it back here.
    pub(crate) async fn relay_config(&self, envelope: Envelope) {
        if is_private(&envelope) {
            warn!(
                app_key = %self.app_key,
                path = %envelope.path,
                "overlay tried to edit a scrubbed field"
            );
            return;
        }
        let mut replica = self.replica.write().await;
        match replica.apply_config_remote(ORIGIN_OVERLAY, &envelope) {
            Ok(ApplyOutcome::Applied) => {
                self.broadcast(SyncFrame::StoreUpdate {
                    envelope: envelope.clone(),
                });
                drop(replica);
                self.send_to_app(SyncFrame::ConfigUpdate { envelope }).await;
            }
            Ok(ApplyOutcome::Skipped) => {
                debug!(path = %envelope.path, "config edit raced a removal, dropped");
            }
            Err(err) => {
                warn!(
                    app_key = %self.app_key,
                    path = %envelope.path,
                    error = %err,
                    "overlay config edit rejected"
                );
            }
        }
    }

    /// Scrubbed snapshot plus a receiver positioned exactly after it.
    ///
    /// Taken under the replica lock so no change record broadcast before
    /// the snapshot can show up on the returned receiver.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the replica cannot be serialized; this
    /// does not happen for well-formed graph data.
    pub async fn snapshot_and_subscribe(
        &self,
    ) -> Result<(WireValue, broadcast::Receiver<SyncFrame>), CodecError> {
        let replica = self.replica.read().await;
        let frames = self.frames.subscribe();
        let snapshot = replica.snapshot_scrubbed()?;
        Ok((snapshot, frames))
    }

    /// Install the backchannel for the room's live publisher.
    pub(crate) async fn set_backchannel(&self, sender: mpsc::UnboundedSender<SyncFrame>) {
        *self.to_app.write().await = Some(sender);
    }

    /// Tear the backchannel down when the publisher disconnects.
    pub(crate) async fn clear_backchannel(&self) {
        *self.to_app.write().await = None;
    }

    async fn send_to_app(&self, frame: SyncFrame) {
        let guard = self.to_app.read().await;
        let Some(to_app) = guard.as_ref() else {
            debug!(app_key = %self.app_key, "no publisher connected, edit not forwarded");
            return;
        };
        if to_app.send(frame).is_err() {
            debug!(app_key = %self.app_key, "publisher backchannel already closed");
        }
    }

    fn broadcast(&self, frame: SyncFrame) {
        // Err just means no overlay is listening right now.
        self.frames.send(frame).unwrap_or(0);
    }
}

/// Whether a change record touches state scrubbed from overlay
/// snapshots. Overlay replicas never hold the signed-in user or the
/// real API key, so changes to either are withheld rather than
/// forwarded, and overlays may not submit edits to them.
fn is_private(envelope: &Envelope) -> bool {
    let name = match &envelope.change {
        ChangeOp::Add { name, .. } | ChangeOp::Update { name, .. } | ChangeOp::Delete { name } => {
            Some(name.as_str())
        }
        ChangeOp::ArrayUpdate { .. } | ChangeOp::ArraySplice { .. } => None,
    };
    if envelope.path.is_empty() {
        return name == Some("user");
    }
    envelope.path == "user"
        || envelope.path.starts_with("user/")
        || (envelope.path == "config" && name == Some("apiKey"))
}

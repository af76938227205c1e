//! In-process transport between the store owner and an embedded window.
//!
//! The window holds its own replica and renders from it. Delivery is
//! acknowledged per message over oneshot channels: the pump withholds the
//! next message until the window confirms the previous one is applied, so
//! the replica can never observe a change out of order or ahead of its
//! bootstrap snapshot. Config edits made in the window travel back over an
//! unbounded channel and are applied with the window's own label, which
//! keeps them from echoing straight back.

use stagelink_types::{Envelope, WireValue};
use tokio::sync::{mpsc, oneshot};

use crate::error::CodecError;
use crate::store::SharedStore;

/// One message for the window replica.
///
/// The receiver applies the payload to its replica and then completes
/// `ack`; nothing further is delivered until it does.
#[derive(Debug)]
pub enum WindowMessage {
    /// Snapshot bootstrap. Always the first message on a connection.
    Init {
        /// Wire form of the whole session graph.
        snapshot: WireValue,
        /// Completed by the window once its replica is hydrated.
        ack: oneshot::Sender<()>,
    },
    /// One ordered change record.
    Update {
        /// The change to apply.
        envelope: Envelope,
        /// Completed by the window once the change is applied.
        ack: oneshot::Sender<()>,
    },
}

/// The window's end of the in-process transport.
#[derive(Debug)]
pub struct WindowConnection {
    /// Ordered messages; each must be acknowledged before the next arrives.
    pub messages: mpsc::Receiver<WindowMessage>,
    /// Backchannel for config edits made in the window's settings UI.
    pub edits: mpsc::UnboundedSender<Envelope>,
}

/// Connect an in-process window to the store.
///
/// Registers a sink under `label` and snapshots the graph under the same
/// write borrow, so the snapshot and the change stream tile exactly: every
/// change is either inside the snapshot or delivered after it, never both.
/// Two background tasks are spawned, one pumping acknowledged messages out
/// and one applying the window's config edits back in. Dropping either end
/// of the returned connection winds both down; the store prunes the dead
/// sink on its next publish.
///
/// # Errors
///
/// Returns a [`CodecError`] if the bootstrap snapshot cannot be encoded.
pub async fn connect_window(
    store: &SharedStore,
    label: impl Into<String>,
) -> Result<WindowConnection, CodecError> {
    let label = label.into();
    let (updates, snapshot) = {
        let mut guard = store.write().await;
        let updates = guard.subscribe(label.clone(), None);
        (updates, guard.snapshot()?)
    };
    let (message_tx, messages) = mpsc::channel(1);
    let (edits, edit_rx) = mpsc::unbounded_channel();

    tokio::spawn(pump_window(label.clone(), snapshot, updates, message_tx));
    tokio::spawn(drain_edits(label, store.clone(), edit_rx));

    Ok(WindowConnection { messages, edits })
}

/// Deliver the bootstrap snapshot and then every queued envelope, waiting
/// for each acknowledgment before sending the next.
async fn pump_window(
    label: String,
    snapshot: WireValue,
    mut updates: mpsc::UnboundedReceiver<Envelope>,
    messages: mpsc::Sender<WindowMessage>,
) {
    let (ack, acked) = oneshot::channel();
    if messages
        .send(WindowMessage::Init { snapshot, ack })
        .await
        .is_err()
    {
        tracing::debug!(label = %label, "window closed before bootstrap");
        return;
    }
    if acked.await.is_err() {
        tracing::debug!(label = %label, "window dropped the bootstrap ack");
        return;
    }
    tracing::info!(label = %label, "window replica hydrated");

    while let Some(envelope) = updates.recv().await {
        let (ack, acked) = oneshot::channel();
        if messages
            .send(WindowMessage::Update { envelope, ack })
            .await
            .is_err()
        {
            break;
        }
        if acked.await.is_err() {
            break;
        }
    }
    tracing::info!(label = %label, "window transport closed");
}

/// Apply config edits made in the window back to the canonical store.
async fn drain_edits(
    label: String,
    store: SharedStore,
    mut edits: mpsc::UnboundedReceiver<Envelope>,
) {
    while let Some(envelope) = edits.recv().await {
        let mut guard = store.write().await;
        if let Err(err) = guard.apply_config_remote(&label, &envelope) {
            tracing::warn!(
                label = %label,
                path = %envelope.path,
                error = %err,
                "window edit rejected"
            );
        }
    }
    tracing::debug!(label = %label, "window edit channel closed");
}

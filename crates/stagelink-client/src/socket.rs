//! Shared socket plumbing for the client adapters: frame codec over
//! text messages, and the reconnect backoff schedule.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use stagelink_types::SyncFrame;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::warn;

use crate::error::ClientError;

/// One live client connection.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serialize and send one frame.
pub(crate) async fn send_frame(
    socket: &mut WsStream,
    frame: &SyncFrame,
) -> Result<(), ClientError> {
    let text = serde_json::to_string(frame).map_err(|e| ClientError::Transport(e.to_string()))?;
    socket
        .send(WsMessage::Text(text))
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))
}

/// Read until the next decodable frame. Malformed frames are contained
/// with a warning; a closed or failed socket ends the session.
pub(crate) async fn recv_frame(socket: &mut WsStream) -> Result<SyncFrame, ClientError> {
    loop {
        let message = socket
            .next()
            .await
            .ok_or_else(|| ClientError::Transport(String::from("connection closed")))?
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        match message {
            WsMessage::Text(text) => {
                if let Some(frame) = decode_frame(&text) {
                    return Ok(frame);
                }
            }
            WsMessage::Close(_) => {
                return Err(ClientError::Transport(String::from("connection closed")));
            }
            WsMessage::Binary(_)
            | WsMessage::Ping(_)
            | WsMessage::Pong(_)
            | WsMessage::Frame(_) => {}
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

/// Double the delay up to a ceiling.
pub(crate) fn next_backoff(current: Duration, max: Duration) -> Duration {
    current.checked_mul(2).map_or(max, |doubled| doubled.min(max))
}

/// Add up to a quarter second of jitter so a fleet of reconnecting
/// clients does not stampede the relay.
pub(crate) fn with_jitter(base: Duration) -> Duration {
    let jitter = rand::rng().random_range(0..250_u64);
    base.saturating_add(Duration::from_millis(jitter))
}

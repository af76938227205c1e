//! REST handlers for the relay's status surface.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::json;
use stagelink_types::{PROTOCOL_VERSION, WireValue};

use crate::state::AppState;

/// `GET /status` -- liveness, protocol version, and room count.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<WireValue> {
    let rooms = state.room_count().await;
    Json(json!({
        "status": "ok",
        "protocolVersion": PROTOCOL_VERSION,
        "rooms": rooms,
    }))
}

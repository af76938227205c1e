//! Axum router construction for the relay.
//!
//! Assembles the status endpoint and both `WebSocket` routes into a
//! single [`Router`] with permissive CORS, since overlays are loaded
//! from arbitrary streaming-software origins.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the relay.
///
/// Routes:
/// - `GET /status` -- liveness and room count
/// - `GET /ingest/{api_key}` -- publisher `WebSocket` (the desktop app)
/// - `GET /overlay/{app_key}` -- overlay `WebSocket` (read-mostly)
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(handlers::status))
        .route("/ingest/{api_key}", get(ws::ingest))
        .route("/overlay/{app_key}", get(ws::overlay))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

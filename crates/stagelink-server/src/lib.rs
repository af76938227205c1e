//! `WebSocket` relay fanning one app's session state out to overlays.
//!
//! A desktop app connects to `/ingest/{api_key}` and streams its
//! canonical graph: a full snapshot first, then one change record per
//! mutation. The relay applies every frame to a per-key server replica
//! and re-broadcasts it to each overlay subscribed at
//! `/overlay/{app_key}`, where the app key is the public digest of the
//! API key ([`appkey`]). Overlays joining late, falling behind, or
//! arriving after an app reconnect are hydrated from the replica's
//! scrubbed snapshot rather than a replay.
//!
//! # Modules
//!
//! - [`appkey`] -- public overlay key derivation
//! - [`state`] -- rooms, replicas, and fan-out channels
//! - [`ws`] -- publisher and overlay `WebSocket` handlers
//! - [`handlers`] -- REST status surface
//! - [`router`] -- route table and middleware
//! - [`server`] -- bind/serve lifecycle

pub mod appkey;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use router::build_router;
pub use server::{ServerConfig, ServerError, init_tracing, spawn_server, start_server};
pub use state::{AppState, Room};

//! End-to-end relay tests over real sockets.
//!
//! Each test binds the relay on an ephemeral port, connects raw
//! `WebSocket` clients with `tokio-tungstenite`, and drives the same
//! frames a desktop app and its overlays would exchange.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use stagelink_server::server::{ServerConfig, spawn_server};
use stagelink_server::state::AppState;
use stagelink_server::{appkey, build_router};
use stagelink_store::Store;
use stagelink_types::{
    ConnectionState, DeviceId, DeviceInfo, DeviceKind, Envelope, ModelKind, PROTOCOL_VERSION,
    SyncFrame, Theme, WireValue,
};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_DEADLINE: Duration = Duration::from_secs(5);

async fn spawn_relay() -> SocketAddr {
    stagelink_server::init_tracing();
    let state = Arc::new(AppState::new());
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    let (addr, _handle) = spawn_server(&config, state).await.unwrap();
    addr
}

fn device_info(id: u8) -> DeviceInfo {
    DeviceInfo {
        id: DeviceId(id),
        name: String::from("CDJ-3000"),
        kind: DeviceKind::Player,
        addr: std::net::IpAddr::V4(std::net::Ipv4Addr::new(192, 168, 1, id)),
    }
}

/// Find a device in a snapshot's flattened device list by player
/// number; entries carry their map key in the `id` field.
fn device_entry(snapshot: &WireValue, id: u8) -> Option<&WireValue> {
    snapshot
        .get("devices")?
        .as_array()?
        .iter()
        .find(|entry| entry.get("id").and_then(WireValue::as_u64) == Some(u64::from(id)))
}

/// A canonical store with a minted key and one device on the floor.
fn seeded_store() -> (Store, Uuid) {
    let mut store = Store::new();
    store.ensure_defaults();
    store.add_device(device_info(2));
    let api_key = store.session().config.api_key;
    (store, api_key)
}

/// Run a mutation and collect every change record it emitted.
fn captured(store: &mut Store, mutate: impl FnOnce(&mut Store)) -> Vec<Envelope> {
    let mut rx = store.subscribe("capture", None);
    mutate(store);
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

async fn send_frame(socket: &mut WsStream, frame: &SyncFrame) {
    let text = serde_json::to_string(frame).unwrap();
    socket.send(WsMessage::Text(text)).await.unwrap();
}

async fn recv_frame(socket: &mut WsStream) -> SyncFrame {
    loop {
        let message = tokio::time::timeout(RECV_DEADLINE, socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match message {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            WsMessage::Binary(_)
            | WsMessage::Ping(_)
            | WsMessage::Pong(_)
            | WsMessage::Close(_)
            | WsMessage::Frame(_) => {}
        }
    }
}

async fn recv_store_init(socket: &mut WsStream) -> WireValue {
    loop {
        if let SyncFrame::StoreInit { snapshot } = recv_frame(socket).await {
            return snapshot;
        }
    }
}

async fn recv_store_update(socket: &mut WsStream) -> Envelope {
    loop {
        if let SyncFrame::StoreUpdate { envelope } = recv_frame(socket).await {
            return envelope;
        }
    }
}

/// Open an ingest socket and run the handshake, reporting the verdict.
async fn try_connect_publisher(
    addr: SocketAddr,
    api_key: Uuid,
    version: u32,
) -> (WsStream, ConnectionState) {
    let (mut socket, _response) = connect_async(format!("ws://{addr}/ingest/{api_key}"))
        .await
        .unwrap();
    send_frame(&mut socket, &SyncFrame::Handshake { version }).await;
    let verdict = match recv_frame(&mut socket).await {
        SyncFrame::HandshakeAck {
            connection_state, ..
        } => Some(connection_state),
        _ => None,
    };
    (socket, verdict.unwrap())
}

/// Connect as the app, retrying until the publisher slot is free.
async fn connect_publisher(addr: SocketAddr, api_key: Uuid) -> WsStream {
    let mut connected = None;
    for _ in 0..50 {
        let (socket, verdict) = try_connect_publisher(addr, api_key, PROTOCOL_VERSION).await;
        if verdict == ConnectionState::Connecting {
            connected = Some(socket);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    connected.unwrap()
}

async fn connect_overlay(addr: SocketAddr, app_key: &str) -> WsStream {
    let (socket, _response) = connect_async(format!("ws://{addr}/overlay/{app_key}"))
        .await
        .unwrap();
    socket
}

/// Send the canonical snapshot, then a ping barrier so the caller knows
/// the relay has hydrated its replica before the test proceeds.
async fn publish_init(publisher: &mut WsStream, store: &Store) {
    let snapshot = store.snapshot().unwrap();
    send_frame(publisher, &SyncFrame::StoreInit { snapshot }).await;
    send_frame(publisher, &SyncFrame::LatencyPing { nonce: 99 }).await;
    let pong = recv_frame(publisher).await;
    assert!(matches!(pong, SyncFrame::LatencyPong { nonce: 99 }));
}

#[tokio::test]
async fn status_reports_room_count() {
    let router = build_router(Arc::new(AppState::new()));
    let response = router
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: WireValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.get("status").and_then(WireValue::as_str), Some("ok"));
    assert_eq!(body.get("rooms").and_then(WireValue::as_u64), Some(0));
    assert_eq!(
        body.get("protocolVersion").and_then(WireValue::as_u64),
        Some(u64::from(PROTOCOL_VERSION))
    );
}

#[tokio::test]
async fn malformed_or_unknown_keys_are_refused() {
    let addr = spawn_relay().await;

    let bad_key = connect_async(format!("ws://{addr}/ingest/not-a-uuid"))
        .await
        .unwrap_err();
    assert_eq!(http_status(&bad_key), Some(400));

    let unknown = connect_async(format!("ws://{addr}/overlay/feedfacefeedface0123"))
        .await
        .unwrap_err();
    assert_eq!(http_status(&unknown), Some(404));
}

fn http_status(error: &tokio_tungstenite::tungstenite::Error) -> Option<u16> {
    match error {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            Some(response.status().as_u16())
        }
        _ => None,
    }
}

#[tokio::test]
async fn handshake_gate_turns_away_bad_versions_and_double_publishers() {
    let addr = spawn_relay().await;
    let api_key = Uuid::new_v4();

    let (_socket, verdict) = try_connect_publisher(addr, api_key, 99).await;
    assert_eq!(verdict, ConnectionState::Disconnected);

    let first = connect_publisher(addr, api_key).await;
    let (_second, verdict) = try_connect_publisher(addr, api_key, PROTOCOL_VERSION).await;
    assert_eq!(verdict, ConnectionState::Disconnected);
    drop(first);
}

#[tokio::test]
async fn snapshots_and_updates_fan_out_scrubbed() {
    let addr = spawn_relay().await;
    let (mut canonical, api_key) = seeded_store();

    let mut publisher = connect_publisher(addr, api_key).await;
    publish_init(&mut publisher, &canonical).await;

    let mut overlay = connect_overlay(addr, &appkey::derive(&api_key)).await;
    let snapshot = recv_store_init(&mut overlay).await;
    assert!(device_entry(&snapshot, 2).is_some());
    // Overlays get the digest-addressed stream but never the key itself.
    assert_eq!(
        snapshot.pointer("/config/apiKey").and_then(WireValue::as_str),
        Some(Uuid::nil().to_string().as_str())
    );

    let updates = captured(&mut canonical, |store| store.add_device(device_info(9)));
    for envelope in updates.clone() {
        send_frame(&mut publisher, &SyncFrame::StoreUpdate { envelope }).await;
    }

    let relayed = recv_store_update(&mut overlay).await;
    assert_eq!(Some(&relayed), updates.first());
    assert_eq!(relayed.path, "devices");
    assert_eq!(relayed.serializer_model, Some(ModelKind::Device));
}

#[tokio::test]
async fn private_changes_never_reach_overlays() {
    let addr = spawn_relay().await;
    let (mut canonical, api_key) = seeded_store();

    let mut publisher = connect_publisher(addr, api_key).await;
    publish_init(&mut publisher, &canonical).await;

    let mut overlay = connect_overlay(addr, &appkey::derive(&api_key)).await;
    recv_store_init(&mut overlay).await;

    let user_updates = captured(&mut canonical, |store| {
        store.set_user(json!({"name": "dj", "plan": "pro"}));
    });
    let theme_updates = captured(&mut canonical, |store| store.set_theme(Theme::Dark));
    for envelope in user_updates.into_iter().chain(theme_updates) {
        send_frame(&mut publisher, &SyncFrame::StoreUpdate { envelope }).await;
    }

    // The user change was sent first; only the theme change arrives.
    let relayed = recv_store_update(&mut overlay).await;
    assert_eq!(relayed.path, "config");
}

#[tokio::test]
async fn overlay_config_edits_round_trip() {
    let addr = spawn_relay().await;
    let (mut canonical, api_key) = seeded_store();

    let mut publisher = connect_publisher(addr, api_key).await;
    publish_init(&mut publisher, &canonical).await;

    let app_key = appkey::derive(&api_key);
    let mut editor = connect_overlay(addr, &app_key).await;
    recv_store_init(&mut editor).await;
    let mut watcher = connect_overlay(addr, &app_key).await;
    recv_store_init(&mut watcher).await;

    let edits = captured(&mut canonical, |store| store.set_theme(Theme::Dark));
    let envelope = edits.into_iter().next().unwrap();
    send_frame(
        &mut editor,
        &SyncFrame::ConfigUpdate {
            envelope: envelope.clone(),
        },
    )
    .await;

    // The app receives the edit on its backchannel...
    let routed = match recv_frame(&mut publisher).await {
        SyncFrame::ConfigUpdate { envelope } => Some(envelope),
        _ => None,
    };
    assert_eq!(routed.unwrap(), envelope);

    // ...and every overlay converges through the broadcast.
    let seen = recv_store_update(&mut watcher).await;
    assert_eq!(seen, envelope);
}

#[tokio::test]
async fn publisher_reconnect_rehydrates_overlays() {
    let addr = spawn_relay().await;
    let (mut canonical, api_key) = seeded_store();

    let mut publisher = connect_publisher(addr, api_key).await;
    publish_init(&mut publisher, &canonical).await;

    let mut overlay = connect_overlay(addr, &appkey::derive(&api_key)).await;
    let before = recv_store_init(&mut overlay).await;
    assert!(device_entry(&before, 7).is_none());

    publisher.close(None).await.unwrap();

    // The app keeps mutating while offline, then resyncs on reconnect.
    canonical.add_device(device_info(7));
    let mut publisher = connect_publisher(addr, api_key).await;
    publish_init(&mut publisher, &canonical).await;

    let after = recv_store_init(&mut overlay).await;
    assert!(device_entry(&after, 2).is_some());
    assert!(device_entry(&after, 7).is_some());
}

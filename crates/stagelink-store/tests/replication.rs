//! End-to-end replication tests.
//!
//! Each test scripts a canonical session, records the emitted change
//! stream, and replays it onto a replica hydrated from a snapshot taken
//! at subscribe time. Convergence means the replica's snapshot is
//! byte-identical to the canonical one afterwards.

#![allow(clippy::unwrap_used)]

use chrono::TimeZone;
use rust_decimal::Decimal;
use stagelink_store::{ApplyOutcome, PlayedTrack, Store};
use stagelink_types::{
    ChangeOp, ConnectionState, DeviceId, DeviceInfo, DeviceKind, Envelope, FetchProgress,
    LinkState, MediaSlot, OverlayInstance, PlayState, PlayerState, TableProgress, Theme, Track,
};
use tokio::sync::mpsc;

fn device_info(id: u8) -> DeviceInfo {
    DeviceInfo {
        id: DeviceId(id),
        name: String::from("CDJ-3000"),
        kind: DeviceKind::Player,
        addr: std::net::IpAddr::V4(std::net::Ipv4Addr::new(192, 168, 1, id)),
    }
}

fn track(id: u32, title: &str) -> Track {
    Track {
        id,
        title: title.to_owned(),
        artist: Some(String::from("Analog Artist")),
        album: None,
        genre: Some(String::from("House")),
        label: None,
        comment: None,
        duration_secs: Some(372),
        bpm: Some(Decimal::new(12_600, 2)),
        key: Some(String::from("8A")),
    }
}

fn played(id: u32, title: &str) -> PlayedTrack {
    let played_at = chrono::Utc
        .with_ymd_and_hms(2024, 6, 1, 20, 30, id)
        .single()
        .unwrap();
    PlayedTrack::new(played_at, track(id, title))
}

fn player_state(bpm_cents: i64, beat: u32) -> PlayerState {
    PlayerState {
        play_state: PlayState::Playing,
        track_id: Some(7),
        track_device: Some(DeviceId(2)),
        track_slot: Some(MediaSlot::Usb),
        beat: Some(beat),
        beat_in_measure: Some(1),
        bpm: Some(Decimal::new(bpm_cents, 2)),
        pitch: Some(Decimal::new(25, 1)),
        is_on_air: true,
        is_sync: false,
        is_master: true,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<Envelope> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

#[test]
fn replica_converges_over_a_scripted_session() {
    let mut canonical = Store::new();
    canonical.set_link_state(LinkState::Online);
    canonical.add_device(device_info(1));

    // The replica joins mid-session: snapshot then live stream.
    let snapshot = canonical.snapshot().unwrap();
    let mut rx = canonical.subscribe("socket", None);
    let mut replica = Store::new();
    replica.hydrate(&snapshot).unwrap();

    canonical.add_device(device_info(2));
    canonical.update_player_state(DeviceId(2), player_state(12_600, 1));
    canonical.update_player_state(DeviceId(2), player_state(12_850, 64));
    canonical.set_track(DeviceId(2), Some(track(7, "Horizon")));
    canonical.set_artwork(DeviceId(2), Some(vec![1, 2, 3, 4]));
    canonical.set_fetch_progress(
        DeviceId(2),
        MediaSlot::Usb,
        Some(FetchProgress {
            read: 512,
            total: Some(4096),
        }),
    );
    canonical.set_table_progress(
        DeviceId(2),
        MediaSlot::Usb,
        "tracks",
        TableProgress {
            complete: 10,
            total: 40,
        },
    );
    canonical.mark_hydration_done(DeviceId(2), MediaSlot::Usb);
    canonical.push_played_track(played(1, "Opener"));
    canonical.push_played_track(played(2, "Peak"));
    canonical.set_theme(Theme::Dark);
    canonical.set_connection_state(ConnectionState::Connecting);
    canonical.remove_device(DeviceId(1));
    canonical.mark_hydrated();

    for envelope in drain(&mut rx) {
        let outcome = replica.apply_remote("socket", &envelope).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied, "path {}", envelope.path);
    }
    assert_eq!(replica.snapshot().unwrap(), canonical.snapshot().unwrap());
}

#[test]
fn device_join_replicates_deep_equal() {
    let mut canonical = Store::new();
    let mut rx = canonical.subscribe("socket", None);
    canonical.add_device(device_info(5));

    let envelope = rx.try_recv().unwrap();
    let wire = serde_json::to_value(&envelope).unwrap();
    assert_eq!(wire.get("path"), Some(&serde_json::json!("devices")));
    assert_eq!(wire.pointer("/change/type"), Some(&serde_json::json!("add")));
    assert_eq!(wire.pointer("/change/name"), Some(&serde_json::json!("5")));
    assert_eq!(
        wire.get("serializerModel"),
        Some(&serde_json::json!("DeviceStore"))
    );

    let mut replica = Store::new();
    assert_eq!(
        replica.apply_remote("socket", &envelope).unwrap(),
        ApplyOutcome::Applied
    );
    assert!(replica.session().devices.contains_key(&DeviceId(5)));
    assert_eq!(
        replica.session().devices.get(&DeviceId(5)),
        canonical.session().devices.get(&DeviceId(5))
    );
}

#[test]
fn history_splices_preserve_order() {
    let mut canonical = Store::new();
    let snapshot = canonical.snapshot().unwrap();
    let mut rx = canonical.subscribe("socket", None);
    let mut replica = Store::new();
    replica.hydrate(&snapshot).unwrap();

    canonical.push_played_track(played(1, "One"));
    canonical.push_played_track(played(2, "Two"));
    canonical.push_played_track(played(3, "Three"));
    canonical.remove_played_track(0);

    for envelope in drain(&mut rx) {
        replica.apply_remote("socket", &envelope).unwrap();
    }
    let titles: Vec<&str> = replica
        .session()
        .mixstatus
        .track_history
        .iter()
        .map(|entry| entry.track.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Two", "Three"]);
    assert_eq!(replica.snapshot().unwrap(), canonical.snapshot().unwrap());
}

#[test]
fn artwork_bytes_cross_as_integer_arrays() {
    let mut canonical = Store::new();
    canonical.add_device(device_info(3));
    let mut rx = canonical.subscribe("socket", None);
    let mut replica = Store::new();
    replica.hydrate(&canonical.snapshot().unwrap()).unwrap();

    let art: Vec<u8> = (0..=255).collect();
    canonical.set_artwork(DeviceId(3), Some(art.clone()));

    let envelope = rx.try_recv().unwrap();
    let wire = serde_json::to_value(&envelope).unwrap();
    let payload = wire
        .pointer("/change/newValue")
        .and_then(|value| value.as_array())
        .map(Vec::len);
    assert_eq!(payload, Some(256));

    replica.apply_remote("socket", &envelope).unwrap();
    assert_eq!(
        replica
            .session()
            .devices
            .get(&DeviceId(3))
            .and_then(|device| device.artwork.as_deref()),
        Some(art.as_slice())
    );
}

#[test]
fn numeric_keys_coerce_but_per_table_keys_do_not() {
    let mut canonical = Store::new();
    canonical.add_device(device_info(5));
    canonical.set_table_progress(
        DeviceId(5),
        MediaSlot::Sd,
        "42",
        TableProgress {
            complete: 1,
            total: 2,
        },
    );
    let mut rx = canonical.subscribe("socket", None);
    let mut replica = Store::new();
    replica.hydrate(&canonical.snapshot().unwrap()).unwrap();

    canonical.update_player_state(DeviceId(5), player_state(12_600, 1));
    canonical.set_table_progress(
        DeviceId(5),
        MediaSlot::Sd,
        "42",
        TableProgress {
            complete: 2,
            total: 2,
        },
    );

    let envelopes = drain(&mut rx);
    // Device segments are decimal strings; perTable keys stay verbatim.
    assert!(envelopes.iter().any(|e| e.path == "devices/5"));
    assert!(envelopes
        .iter()
        .any(|e| e.path == "devices/5/hydrationProgress/Sd/perTable"));
    for envelope in &envelopes {
        assert_eq!(
            replica.apply_remote("socket", envelope).unwrap(),
            ApplyOutcome::Applied
        );
    }
    let progress = replica
        .session()
        .devices
        .get(&DeviceId(5))
        .and_then(|device| device.hydration_progress.get(&MediaSlot::Sd))
        .and_then(|info| info.per_table.get("42").copied());
    assert_eq!(
        progress,
        Some(TableProgress {
            complete: 2,
            total: 2,
        })
    );
}

#[test]
fn one_malformed_record_does_not_stop_the_stream() {
    let mut canonical = Store::new();
    let snapshot = canonical.snapshot().unwrap();
    let mut rx = canonical.subscribe("socket", None);
    let mut replica = Store::new();
    replica.hydrate(&snapshot).unwrap();

    canonical.set_theme(Theme::Dark);
    canonical.set_history_limit(10);

    let mut envelopes = drain(&mut rx);
    let poison = Envelope {
        path: String::from("config"),
        change: ChangeOp::Update {
            name: String::from("historyLimit"),
            new_value: serde_json::json!("not a number"),
        },
        serializer_model: None,
    };
    envelopes.insert(1, poison);

    let mut failures = Vec::new();
    for envelope in &envelopes {
        if let Err(err) = replica.apply_remote("socket", envelope) {
            failures.push(err);
        }
    }
    assert_eq!(failures.len(), 1);
    assert_eq!(replica.session().config.theme, Theme::Dark);
    assert_eq!(replica.session().config.history_limit, 10);
}

#[test]
fn updates_racing_a_departure_are_dropped_quietly() {
    let mut canonical = Store::new();
    canonical.add_device(device_info(4));
    let snapshot = canonical.snapshot().unwrap();
    let mut rx = canonical.subscribe("socket", None);
    let mut replica = Store::new();
    replica.hydrate(&snapshot).unwrap();

    canonical.update_player_state(DeviceId(4), player_state(12_600, 1));
    canonical.remove_device(DeviceId(4));
    let envelopes = drain(&mut rx);
    assert_eq!(envelopes.len(), 2);

    // A slow transport can deliver the update after the departure.
    let delete = envelopes.last().unwrap();
    let stale = envelopes.first().unwrap();
    assert_eq!(
        replica.apply_remote("socket", delete).unwrap(),
        ApplyOutcome::Applied
    );
    assert_eq!(
        replica.apply_remote("socket", stale).unwrap(),
        ApplyOutcome::Skipped
    );
    assert_eq!(replica.snapshot().unwrap(), canonical.snapshot().unwrap());
}

#[test]
fn snapshots_are_idempotent_across_hydrate_cycles() {
    let mut canonical = Store::new();
    canonical.ensure_defaults();
    canonical.set_link_state(LinkState::Connected);
    canonical.add_device(device_info(1));
    canonical.update_player_state(DeviceId(1), player_state(12_850, 16));
    canonical.push_played_track(played(1, "Opener"));
    canonical.add_overlay(OverlayInstance {
        key: String::from("ovl-1"),
        kind: String::from("nowPlaying"),
        options: serde_json::json!({"showArtwork": true}),
    });
    canonical.set_user(serde_json::json!({"displayName": "dj", "plan": "pro"}));
    canonical.set_connection_state(ConnectionState::Synced);
    canonical.set_latency(Some(Decimal::new(125, 1)));

    let first = canonical.snapshot().unwrap();
    let mut replica = Store::new();
    replica.hydrate(&first).unwrap();
    let second = replica.snapshot().unwrap();
    assert_eq!(first, second);

    let mut third = Store::new();
    third.hydrate(&second).unwrap();
    assert_eq!(third.snapshot().unwrap(), second);
}

//! The canonical store handle: state graph, mutators, and change fan-out.
//!
//! There is no ambient global store. The owning process creates a
//! [`Store`], wraps it in [`SharedStore`], and passes the handle to every
//! producer and transport. Mutators synchronously mutate the graph and
//! emit exactly one envelope per logical mutation, holding only the
//! minimal delta; emission order equals mutation order because both
//! happen under the same write borrow.

use std::collections::btree_map::Entry;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use stagelink_types::{
    ChangeOp, ConnectionState, DeviceId, DeviceInfo, Envelope, FetchProgress, LinkState,
    MediaSlot, MixMode, ModelKind, OverlayInstance, PlayerState, TableProgress, Theme, Track,
    WireValue,
};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::codec;
use crate::error::{ApplyError, CodecError};
use crate::models::{
    ApplyOutcome, DeviceStore, HydrationInfo, PlayedTrack, SessionStore, StoreModel,
};
use crate::path;
use crate::relay::Relay;

/// The store handle shared between producers and transports.
pub type SharedStore = Arc<RwLock<Store>>;

/// The canonical state graph plus its change relay.
#[derive(Debug, Default)]
pub struct Store {
    session: SessionStore,
    relay: Relay,
}

impl Store {
    /// Create a store with a default (empty) graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store over an existing graph, typically a replica about
    /// to be hydrated.
    #[must_use]
    pub fn with_session(session: SessionStore) -> Self {
        Self {
            session,
            relay: Relay::default(),
        }
    }

    /// Wrap this store in the shared handle transports expect.
    #[must_use]
    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    /// Read access to the graph.
    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Register a transport sink. Envelopes emitted after this call are
    /// queued for the returned receiver; earlier state arrives via
    /// [`Store::snapshot`].
    pub fn subscribe(
        &mut self,
        label: impl Into<String>,
        filter: Option<String>,
    ) -> mpsc::UnboundedReceiver<Envelope> {
        self.relay.register(label, filter)
    }

    // -----------------------------------------------------------------------
    // Snapshot sync
    // -----------------------------------------------------------------------

    /// Serialize the entire graph through the root schema.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if the graph cannot be represented as
    /// JSON; this does not happen for well-formed graph data.
    pub fn snapshot(&self) -> Result<WireValue, CodecError> {
        self.session.to_wire()
    }

    /// Like [`Store::snapshot`], with the private API key and the user
    /// profile blanked for delivery to public overlay clients.
    ///
    /// # Errors
    ///
    /// Same as [`Store::snapshot`].
    pub fn snapshot_scrubbed(&self) -> Result<WireValue, CodecError> {
        let mut wire = self.session.to_wire()?;
        scrub(&mut wire);
        Ok(wire)
    }

    /// Replace the graph contents with a received snapshot. Registered
    /// sinks and the handle itself stay valid.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the snapshot does not decode through
    /// the root schema; the existing graph is left untouched.
    pub fn hydrate(&mut self, snapshot: &WireValue) -> Result<(), CodecError> {
        self.session = SessionStore::from_wire(snapshot)?;
        tracing::debug!("replica hydrated from snapshot");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Remote application
    // -----------------------------------------------------------------------

    /// Apply one envelope received from the transport labeled `origin`,
    /// then forward it to every sink except that origin.
    ///
    /// A missing target is a recognized race and yields
    /// [`ApplyOutcome::Skipped`] without forwarding.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplyError`] when the envelope is malformed for the
    /// position it addresses. Callers log and continue; one bad record
    /// never stops the stream.
    pub fn apply_remote(
        &mut self,
        origin: &str,
        envelope: &Envelope,
    ) -> Result<ApplyOutcome, ApplyError> {
        let segments = path::segments(&envelope.path);
        let outcome = self.session.apply_at(&segments, &envelope.change)?;
        match outcome {
            ApplyOutcome::Applied => {
                self.relay.publish_except(origin, envelope);
            }
            ApplyOutcome::Skipped => {
                tracing::debug!(
                    path = %envelope.path,
                    op = envelope.change.op_name(),
                    "change raced a removal, dropped"
                );
            }
        }
        Ok(outcome)
    }

    /// Apply an envelope from a config backchannel. Identical to
    /// [`Store::apply_remote`] but restricted to the config subtree.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::OutsideConfig`] for any path not rooted at
    /// `config`, plus everything [`Store::apply_remote`] returns.
    pub fn apply_config_remote(
        &mut self,
        origin: &str,
        envelope: &Envelope,
    ) -> Result<ApplyOutcome, ApplyError> {
        if !is_config_path(&envelope.path) {
            return Err(ApplyError::OutsideConfig {
                path: envelope.path.clone(),
            });
        }
        self.apply_remote(origin, envelope)
    }

    // -----------------------------------------------------------------------
    // Session mutators
    // -----------------------------------------------------------------------

    /// Record the link network binding state.
    pub fn set_link_state(&mut self, state: LinkState) {
        if self.session.link_state == state {
            return;
        }
        self.session.link_state = state;
        tracing::info!(state = ?state, "link state changed");
        if let Some(new_value) = encode_or_log(&state, "link state") {
            self.emit(
                String::new(),
                ChangeOp::Update {
                    name: String::from("linkState"),
                    new_value,
                },
                None,
            );
        }
    }

    /// Record that local track databases have finished hydrating.
    pub fn mark_hydrated(&mut self) {
        if self.session.is_hydrated {
            return;
        }
        self.session.is_hydrated = true;
        tracing::info!("local databases hydrated");
        self.emit(
            String::new(),
            ChangeOp::Update {
                name: String::from("isHydrated"),
                new_value: WireValue::Bool(true),
            },
            None,
        );
    }

    /// Record the signed-in user profile.
    pub fn set_user(&mut self, user: WireValue) {
        if self.session.user.as_ref() == Some(&user) {
            return;
        }
        self.session.user = Some(user.clone());
        self.emit(
            String::new(),
            ChangeOp::Update {
                name: String::from("user"),
                new_value: user,
            },
            None,
        );
    }

    /// Drop the signed-in user profile.
    pub fn clear_user(&mut self) {
        if self.session.user.take().is_none() {
            return;
        }
        self.emit(
            String::new(),
            ChangeOp::Delete {
                name: String::from("user"),
            },
            None,
        );
    }

    // -----------------------------------------------------------------------
    // Device mutators
    // -----------------------------------------------------------------------

    /// Record a device announcing itself. A re-announcement replaces the
    /// whole entry.
    pub fn add_device(&mut self, device: DeviceInfo) {
        let id = device.id;
        let entry = DeviceStore::new(device);
        let existed = self.session.devices.contains_key(&id);
        let wire = model_wire_or_log(&entry);
        self.session.devices.insert(id, entry);
        if existed {
            tracing::debug!(device = %id, "device re-announced, entry replaced");
        } else {
            tracing::info!(device = %id, "device joined");
        }
        let Some(new_value) = wire else { return };
        let name = id.to_string();
        let change = if existed {
            ChangeOp::Update { name, new_value }
        } else {
            ChangeOp::Add { name, new_value }
        };
        self.emit(String::from("devices"), change, Some(ModelKind::Device));
    }

    /// Record a device leaving the network.
    pub fn remove_device(&mut self, id: DeviceId) {
        if self.session.devices.remove(&id).is_none() {
            return;
        }
        tracing::info!(device = %id, "device left");
        self.emit(
            String::from("devices"),
            ChangeOp::Delete {
                name: id.to_string(),
            },
            None,
        );
    }

    /// Update a device's announced identity.
    pub fn set_device_info(&mut self, id: DeviceId, info: DeviceInfo) {
        let Some(device) = self.session.devices.get_mut(&id) else {
            tracing::debug!(device = %id, "identity update for unknown device dropped");
            return;
        };
        if device.device == info {
            return;
        }
        let wire = model_wire_or_log(&info);
        device.device = info;
        let Some(new_value) = wire else { return };
        self.emit(
            format!("devices/{id}"),
            ChangeOp::Update {
                name: String::from("device"),
                new_value,
            },
            Some(ModelKind::DeviceInfo),
        );
    }

    /// Record a status packet for a device.
    ///
    /// The first packet sets the whole `state` subtree; thereafter only
    /// the fields that actually changed are emitted, one envelope each,
    /// in the deterministic order of the wire form.
    pub fn update_player_state(&mut self, id: DeviceId, state: PlayerState) {
        let Some(device) = self.session.devices.get_mut(&id) else {
            tracing::debug!(device = %id, "player state for unknown device dropped");
            return;
        };
        let previous = device.state.replace(state.clone());
        match previous {
            None => {
                if let Some(new_value) = encode_or_log(&state, "player state") {
                    self.emit(
                        format!("devices/{id}"),
                        ChangeOp::Update {
                            name: String::from("state"),
                            new_value,
                        },
                        None,
                    );
                }
            }
            Some(ref prev) if *prev == state => {}
            Some(prev) => {
                let (Ok(before), Ok(after)) =
                    (codec::encode_raw(&prev), codec::encode_raw(&state))
                else {
                    tracing::error!(device = %id, "player state diff failed to encode");
                    return;
                };
                let path = format!("devices/{id}/state");
                for (name, new_value) in diff_fields(&before, &after) {
                    self.emit(path.clone(), ChangeOp::Update { name, new_value }, None);
                }
            }
        }
    }

    /// Record the track loaded on a device. `None` clears it.
    pub fn set_track(&mut self, id: DeviceId, track: Option<Track>) {
        let Some(device) = self.session.devices.get_mut(&id) else {
            tracing::debug!(device = %id, "track update for unknown device dropped");
            return;
        };
        if device.track == track {
            return;
        }
        device.track = track;
        let Some(new_value) = encode_or_log(&device.track, "track") else {
            return;
        };
        self.emit(
            format!("devices/{id}"),
            ChangeOp::Update {
                name: String::from("track"),
                new_value,
            },
            None,
        );
    }

    /// Record the artwork of the loaded track. `None` clears it.
    pub fn set_artwork(&mut self, id: DeviceId, artwork: Option<Vec<u8>>) {
        let Some(device) = self.session.devices.get_mut(&id) else {
            tracing::debug!(device = %id, "artwork for unknown device dropped");
            return;
        };
        if device.artwork == artwork {
            return;
        }
        let new_value = artwork
            .as_deref()
            .map_or(WireValue::Null, codec::encode_bytes);
        device.artwork = artwork;
        self.emit(
            format!("devices/{id}"),
            ChangeOp::Update {
                name: String::from("artwork"),
                new_value,
            },
            None,
        );
    }

    /// Record database fetch progress for one media slot. `None` clears
    /// the slot's entry.
    pub fn set_fetch_progress(
        &mut self,
        id: DeviceId,
        slot: MediaSlot,
        progress: Option<FetchProgress>,
    ) {
        let Some(device) = self.session.devices.get_mut(&id) else {
            tracing::debug!(device = %id, "fetch progress for unknown device dropped");
            return;
        };
        let Some(name) = slot_key(slot) else { return };
        let path = format!("devices/{id}/fetchProgress");
        match progress {
            Some(progress) => {
                let previous = device.fetch_progress.insert(slot, progress);
                if previous == Some(progress) {
                    return;
                }
                let Some(new_value) = encode_or_log(&progress, "fetch progress") else {
                    return;
                };
                let change = if previous.is_some() {
                    ChangeOp::Update { name, new_value }
                } else {
                    ChangeOp::Add { name, new_value }
                };
                self.emit(path, change, None);
            }
            None => {
                if device.fetch_progress.remove(&slot).is_none() {
                    return;
                }
                self.emit(path, ChangeOp::Delete { name }, None);
            }
        }
    }

    /// Record hydration progress for one table of one media slot's
    /// database. The slot's tracker is created on first use.
    pub fn set_table_progress(
        &mut self,
        id: DeviceId,
        slot: MediaSlot,
        table: &str,
        progress: TableProgress,
    ) {
        let Some(device) = self.session.devices.get_mut(&id) else {
            tracing::debug!(device = %id, "hydration progress for unknown device dropped");
            return;
        };
        let Some(slot_name) = slot_key(slot) else { return };
        match device.hydration_progress.entry(slot) {
            Entry::Occupied(mut entry) => {
                let previous = entry.get_mut().per_table.insert(table.to_owned(), progress);
                if previous == Some(progress) {
                    return;
                }
                let Some(new_value) = encode_or_log(&progress, "table progress") else {
                    return;
                };
                let name = table.to_owned();
                let change = if previous.is_some() {
                    ChangeOp::Update { name, new_value }
                } else {
                    ChangeOp::Add { name, new_value }
                };
                self.emit(
                    format!("devices/{id}/hydrationProgress/{slot_name}/perTable"),
                    change,
                    None,
                );
            }
            Entry::Vacant(entry) => {
                let mut info = HydrationInfo::default();
                info.per_table.insert(table.to_owned(), progress);
                let wire = model_wire_or_log(&info);
                entry.insert(info);
                let Some(new_value) = wire else { return };
                self.emit(
                    format!("devices/{id}/hydrationProgress"),
                    ChangeOp::Add {
                        name: slot_name,
                        new_value,
                    },
                    Some(ModelKind::Hydration),
                );
            }
        }
    }

    /// Record that one media slot's database finished hydrating.
    pub fn mark_hydration_done(&mut self, id: DeviceId, slot: MediaSlot) {
        let Some(device) = self.session.devices.get_mut(&id) else {
            tracing::debug!(device = %id, "hydration done for unknown device dropped");
            return;
        };
        let Some(info) = device.hydration_progress.get_mut(&slot) else {
            tracing::debug!(device = %id, "hydration done for untracked slot dropped");
            return;
        };
        if info.is_done {
            return;
        }
        info.is_done = true;
        let Some(slot_name) = slot_key(slot) else { return };
        self.emit(
            format!("devices/{id}/hydrationProgress/{slot_name}"),
            ChangeOp::Update {
                name: String::from("isDone"),
                new_value: WireValue::Bool(true),
            },
            None,
        );
    }

    // -----------------------------------------------------------------------
    // History mutators
    // -----------------------------------------------------------------------

    /// Append a reported track to the history.
    ///
    /// Emits the push as a splice at the end of the array; when the
    /// configured history limit is exceeded, a second splice trims the
    /// oldest entries.
    pub fn push_played_track(&mut self, played: PlayedTrack) {
        let index = self.session.mixstatus.track_history.len();
        let wire = model_wire_or_log(&played);
        self.session.mixstatus.track_history.push(played);
        if let Some(new_value) = wire {
            self.emit(
                String::from("mixstatus/trackHistory"),
                ChangeOp::ArraySplice {
                    index,
                    removed_count: 0,
                    added: vec![new_value],
                },
                Some(ModelKind::Played),
            );
        }
        self.trim_history();
    }

    /// Replace one history entry in place, used to backfill artwork that
    /// finished loading after the entry was reported.
    pub fn replace_played_track(&mut self, index: usize, played: PlayedTrack) {
        let Some(slot) = self.session.mixstatus.track_history.get_mut(index) else {
            tracing::debug!(index, "history replacement out of range, dropped");
            return;
        };
        if *slot == played {
            return;
        }
        let wire = model_wire_or_log(&played);
        *slot = played;
        let Some(new_value) = wire else { return };
        self.emit(
            String::from("mixstatus/trackHistory"),
            ChangeOp::ArrayUpdate { index, new_value },
            Some(ModelKind::Played),
        );
    }

    /// Remove one history entry.
    pub fn remove_played_track(&mut self, index: usize) {
        if index >= self.session.mixstatus.track_history.len() {
            tracing::debug!(index, "history removal out of range, dropped");
            return;
        }
        self.session.mixstatus.track_history.remove(index);
        self.emit(
            String::from("mixstatus/trackHistory"),
            ChangeOp::ArraySplice {
                index,
                removed_count: 1,
                added: Vec::new(),
            },
            None,
        );
    }

    /// Drop the whole history.
    pub fn clear_history(&mut self) {
        let len = self.session.mixstatus.track_history.len();
        if len == 0 {
            return;
        }
        self.session.mixstatus.track_history.clear();
        self.emit(
            String::from("mixstatus/trackHistory"),
            ChangeOp::ArraySplice {
                index: 0,
                removed_count: len,
                added: Vec::new(),
            },
            None,
        );
    }

    fn trim_history(&mut self) {
        let limit = self.session.config.history_limit;
        if limit == 0 {
            return;
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let len = self.session.mixstatus.track_history.len();
        let Some(overflow) = len.checked_sub(limit).filter(|n| *n > 0) else {
            return;
        };
        drop(self.session.mixstatus.track_history.drain(0..overflow));
        self.emit(
            String::from("mixstatus/trackHistory"),
            ChangeOp::ArraySplice {
                index: 0,
                removed_count: overflow,
                added: Vec::new(),
            },
            None,
        );
    }

    // -----------------------------------------------------------------------
    // Config mutators
    // -----------------------------------------------------------------------

    /// Set the UI theme.
    pub fn set_theme(&mut self, theme: Theme) {
        if self.session.config.theme == theme {
            return;
        }
        self.session.config.theme = theme;
        self.set_config_field("theme", &theme);
    }

    /// Set the overlay text ID marker.
    pub fn set_id_marker(&mut self, marker: impl Into<String>) {
        let marker = marker.into();
        if self.session.config.id_marker == marker {
            return;
        }
        let wire = encode_or_log(&marker, "config field");
        self.session.config.id_marker = marker;
        let Some(new_value) = wire else { return };
        self.emit(
            String::from("config"),
            ChangeOp::Update {
                name: String::from("idMarker"),
                new_value,
            },
            None,
        );
    }

    /// Enable or disable the upstream connection.
    pub fn set_enable_cloud(&mut self, enabled: bool) {
        if self.session.config.enable_cloud == enabled {
            return;
        }
        self.session.config.enable_cloud = enabled;
        self.set_config_field("enableCloud", &enabled);
    }

    /// Set the history trim limit. Zero disables trimming.
    pub fn set_history_limit(&mut self, limit: u32) {
        if self.session.config.history_limit == limit {
            return;
        }
        self.session.config.history_limit = limit;
        self.set_config_field("historyLimit", &limit);
    }

    /// Set the mix reporting mode.
    pub fn set_mix_mode(&mut self, mode: MixMode) {
        if self.session.config.mix_settings.mode == mode {
            return;
        }
        self.session.config.mix_settings.mode = mode;
        self.set_mix_field("mode", &mode);
    }

    /// Set how many beats of interruption end a track's play.
    pub fn set_allowed_interrupt_beats(&mut self, beats: u32) {
        if self.session.config.mix_settings.allowed_interrupt_beats == beats {
            return;
        }
        self.session.config.mix_settings.allowed_interrupt_beats = beats;
        self.set_mix_field("allowedInterruptBeats", &beats);
    }

    /// Set how many beats must play before a track is reported.
    pub fn set_beats_until_reported(&mut self, beats: u32) {
        if self.session.config.mix_settings.beats_until_reported == beats {
            return;
        }
        self.session.config.mix_settings.beats_until_reported = beats;
        self.set_mix_field("beatsUntilReported", &beats);
    }

    /// Set the idle gap, in minutes, that separates two sets.
    pub fn set_time_between_sets(&mut self, minutes: u32) {
        if self.session.config.mix_settings.time_between_sets == minutes {
            return;
        }
        self.session.config.mix_settings.time_between_sets = minutes;
        self.set_mix_field("timeBetweenSets", &minutes);
    }

    /// Toggle whether the mixer's on-air flags gate reporting.
    pub fn set_use_on_air_status(&mut self, enabled: bool) {
        if self.session.config.mix_settings.use_on_air_status == enabled {
            return;
        }
        self.session.config.mix_settings.use_on_air_status = enabled;
        self.set_mix_field("useOnAirStatus", &enabled);
    }

    /// Add an overlay instance.
    pub fn add_overlay(&mut self, overlay: OverlayInstance) {
        let index = self.session.config.overlays.len();
        let wire = encode_or_log(&overlay, "overlay");
        self.session.config.overlays.push(overlay);
        let Some(new_value) = wire else { return };
        self.emit(
            String::from("config/overlays"),
            ChangeOp::ArraySplice {
                index,
                removed_count: 0,
                added: vec![new_value],
            },
            None,
        );
    }

    /// Remove the overlay instance with the given key.
    pub fn remove_overlay(&mut self, key: &str) {
        let Some(index) = self
            .session
            .config
            .overlays
            .iter()
            .position(|overlay| overlay.key == key)
        else {
            tracing::debug!(key, "overlay removal for unknown key dropped");
            return;
        };
        self.session.config.overlays.remove(index);
        self.emit(
            String::from("config/overlays"),
            ChangeOp::ArraySplice {
                index,
                removed_count: 1,
                added: Vec::new(),
            },
            None,
        );
    }

    /// Replace the options blob of the overlay with the given key.
    pub fn update_overlay_options(&mut self, key: &str, options: WireValue) {
        let Some((index, overlay)) = self
            .session
            .config
            .overlays
            .iter_mut()
            .enumerate()
            .find(|(_, overlay)| overlay.key == key)
        else {
            tracing::debug!(key, "overlay options for unknown key dropped");
            return;
        };
        if overlay.options == options {
            return;
        }
        overlay.options = options.clone();
        self.emit(
            format!("config/overlays/{index}"),
            ChangeOp::Update {
                name: String::from("options"),
                new_value: options,
            },
            None,
        );
    }

    /// First-run completion: mint an API key when none is stored yet.
    /// Returns whether one was minted.
    pub fn ensure_defaults(&mut self) -> bool {
        if !self.session.config.ensure_defaults() {
            return false;
        }
        tracing::info!("minted a fresh api key");
        let key = self.session.config.api_key;
        if let Some(new_value) = encode_or_log(&key, "config field") {
            self.emit(
                String::from("config"),
                ChangeOp::Update {
                    name: String::from("apiKey"),
                    new_value,
                },
                None,
            );
        }
        true
    }

    // -----------------------------------------------------------------------
    // Cloud mutators
    // -----------------------------------------------------------------------

    /// Record where the upstream connection stands.
    pub fn set_connection_state(&mut self, state: ConnectionState) {
        if self.session.cloud.connection_state == state {
            return;
        }
        self.session.cloud.connection_state = state;
        tracing::info!(state = ?state, "upstream connection state changed");
        if let Some(new_value) = encode_or_log(&state, "cloud field") {
            self.emit(
                String::from("cloud"),
                ChangeOp::Update {
                    name: String::from("connectionState"),
                    new_value,
                },
                None,
            );
        }
    }

    /// Record an upstream latency measurement. `None` clears it.
    pub fn set_latency(&mut self, latency_ms: Option<Decimal>) {
        if self.session.cloud.latency_ms == latency_ms {
            return;
        }
        self.session.cloud.latency_ms = latency_ms;
        if let Some(new_value) = encode_or_log(&latency_ms, "cloud field") {
            self.emit(
                String::from("cloud"),
                ChangeOp::Update {
                    name: String::from("latencyMs"),
                    new_value,
                },
                None,
            );
        }
    }

    // -----------------------------------------------------------------------
    // Emission plumbing
    // -----------------------------------------------------------------------

    fn set_config_field<T: Serialize>(&mut self, name: &str, value: &T) {
        if let Some(new_value) = encode_or_log(value, "config field") {
            self.emit(
                String::from("config"),
                ChangeOp::Update {
                    name: name.to_owned(),
                    new_value,
                },
                None,
            );
        }
    }

    fn set_mix_field<T: Serialize>(&mut self, name: &str, value: &T) {
        if let Some(new_value) = encode_or_log(value, "mix setting") {
            self.emit(
                String::from("config/mixSettings"),
                ChangeOp::Update {
                    name: name.to_owned(),
                    new_value,
                },
                None,
            );
        }
    }

    fn emit(&mut self, path: String, change: ChangeOp, model: Option<ModelKind>) {
        let envelope = Envelope {
            path,
            change,
            serializer_model: model,
        };
        tracing::trace!(
            path = %envelope.path,
            op = envelope.change.op_name(),
            "change emitted"
        );
        self.relay.publish(&envelope);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_config_path(path: &str) -> bool {
    path == "config" || path.starts_with("config/")
}

fn scrub(snapshot: &mut WireValue) {
    if let Some(config) = snapshot.get_mut("config").and_then(WireValue::as_object_mut) {
        config.insert(
            String::from("apiKey"),
            WireValue::String(Uuid::nil().to_string()),
        );
    }
    if let Some(root) = snapshot.as_object_mut() {
        root.insert(String::from("user"), WireValue::Null);
    }
}

fn slot_key(slot: MediaSlot) -> Option<String> {
    codec::encode_raw(&slot)
        .ok()
        .and_then(|wire| wire.as_str().map(ToOwned::to_owned))
}

/// Entries of `after` whose value differs from `before`, in the
/// deterministic order of the wire form.
fn diff_fields(before: &WireValue, after: &WireValue) -> Vec<(String, WireValue)> {
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return Vec::new();
    };
    after
        .iter()
        .filter(|&(key, value)| before.get(key) != Some(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn encode_or_log<T: Serialize>(value: &T, what: &'static str) -> Option<WireValue> {
    codec::encode_raw(value)
        .inspect_err(|err| tracing::error!(what, error = %err, "change payload failed to encode"))
        .ok()
}

fn model_wire_or_log<M: StoreModel>(value: &M) -> Option<WireValue> {
    value
        .to_wire()
        .inspect_err(|err| {
            tracing::error!(model = %M::KIND, error = %err, "change payload failed to encode");
        })
        .ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Declarative event/port binding tables.
//!
//! The browser-era integration wired every event with its own hand-written
//! closure. Here the whole vocabulary is data: one table entry per event or
//! port, applied by a single generic routine in the dispatcher. The backend
//! renamed its wire events once (underscore era to hyphen era), so both
//! vocabularies exist as tables and the bridge targets either by swapping
//! configuration, not code.

use std::collections::HashSet;

use serde_json::{Value, json};

use super::error::{BridgeError, BridgeResult, PayloadShapeError};
use super::types::Envelope;

/// Fixed envelope tag for the generic startup broadcast.
pub const STARTUP_TAG: &str = "startup";

/// How a raw payload is reshaped before crossing the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Pass the payload through untouched.
    Identity,
    /// Wrap the payload in an [`Envelope`] tagged [`STARTUP_TAG`].
    Startup,
    /// Wrap the payload in an [`Envelope`] tagged with the canonical event
    /// name.
    Tagged,
    /// Extract a single field.
    Field(&'static str),
    /// Extract two fields as a `[first, second]` pair.
    Pair(&'static str, &'static str),
    /// Reshape a settings broadcast into
    /// `[application, {application, saving, namespaces}]`.
    Settings,
}

impl Transform {
    /// Apply the transform to `payload` on behalf of the event whose
    /// canonical name is `canonical`.
    pub fn apply(&self, canonical: &str, payload: Value) -> Result<Value, PayloadShapeError> {
        match self {
            Transform::Identity => Ok(payload),
            Transform::Startup => Ok(Envelope::new(STARTUP_TAG, payload).into_value()),
            Transform::Tagged => Ok(Envelope::new(canonical, payload).into_value()),
            Transform::Field(field) => take_field(canonical, &payload, field),
            Transform::Pair(first, second) => {
                let a = take_field(canonical, &payload, first)?;
                let b = take_field(canonical, &payload, second)?;
                Ok(json!([a, b]))
            }
            Transform::Settings => {
                let application = take_field(canonical, &payload, "application")?;
                let namespaces = take_field(canonical, &payload, "settings")?;
                let settings = json!({
                    "application": application,
                    "saving": false,
                    "namespaces": namespaces,
                });
                Ok(json!([application, settings]))
            }
        }
    }
}

fn take_field(
    event: &str,
    payload: &Value,
    field: &'static str,
) -> Result<Value, PayloadShapeError> {
    payload
        .get(field)
        .cloned()
        .ok_or_else(|| PayloadShapeError {
            event: event.to_string(),
            field,
            payload: payload.clone(),
        })
}

/// A configured inbound rule: one wire event delivered to one UI port.
#[derive(Debug, Clone)]
pub struct InboundBinding {
    /// Event name as it appears on the wire.
    pub event: String,
    /// Stable logical name, used as the envelope tag for tagged transforms.
    pub canonical: String,
    /// UI port the transformed value is sent to.
    pub port: String,
    pub transform: Transform,
}

impl InboundBinding {
    pub fn new(event: &str, canonical: &str, port: &str, transform: Transform) -> Self {
        Self {
            event: event.to_string(),
            canonical: canonical.to_string(),
            port: port.to_string(),
            transform,
        }
    }
}

/// A configured outbound rule: one UI port pushed out as one wire event.
#[derive(Debug, Clone)]
pub struct OutboundBinding {
    /// UI port the bridge subscribes to.
    pub port: String,
    /// Event name pushed to the transport.
    pub event: String,
    pub transform: Transform,
}

impl OutboundBinding {
    pub fn new(port: &str, event: &str, transform: Transform) -> Self {
        Self {
            port: port.to_string(),
            event: event.to_string(),
            transform,
        }
    }
}

/// The full wiring for one bridge: every inbound and outbound rule.
///
/// Immutable once built. Inbound rules are keyed by wire event name,
/// outbound rules by port name; a duplicate in either direction is a
/// programmer error and fails construction.
#[derive(Debug, Clone)]
pub struct BindingTable {
    inbound: Vec<InboundBinding>,
    outbound: Vec<OutboundBinding>,
}

impl BindingTable {
    /// Build a table, rejecting duplicate event or port names.
    pub fn new(
        inbound: Vec<InboundBinding>,
        outbound: Vec<OutboundBinding>,
    ) -> BridgeResult<Self> {
        let mut events = HashSet::new();
        for binding in &inbound {
            if !events.insert(binding.event.as_str()) {
                return Err(BridgeError::DuplicateEvent(binding.event.clone()));
            }
        }
        let mut ports = HashSet::new();
        for binding in &outbound {
            if !ports.insert(binding.port.as_str()) {
                return Err(BridgeError::DuplicatePort(binding.port.clone()));
            }
        }
        Ok(Self { inbound, outbound })
    }

    pub fn inbound(&self) -> &[InboundBinding] {
        &self.inbound
    }

    pub fn outbound(&self) -> &[OutboundBinding] {
        &self.outbound
    }

    /// The current hyphenated wire vocabulary.
    pub fn current() -> BridgeResult<Self> {
        use Transform::*;
        let inbound = vec![
            InboundBinding::new("state", STARTUP_TAG, "broadcasterState", Startup),
            InboundBinding::new("receiver-add", "receiver-add", "receiverStatus", Tagged),
            InboundBinding::new("receiver-remove", "receiver-remove", "receiverStatus", Tagged),
            InboundBinding::new("receiver-online", "receiver-online", "receiverPresence", Identity),
            InboundBinding::new(
                "receiver-rename",
                "receiver-rename",
                "receiverRenames",
                Pair("receiverId", "name"),
            ),
            InboundBinding::new(
                "receiver-mute",
                "receiver-mute",
                "receiverMuting",
                Pair("receiverId", "muted"),
            ),
            InboundBinding::new("channel-add", "channel-add", "channelAdditions", Identity),
            InboundBinding::new("channel-remove", "channel-remove", "channelRemovals", Field("id")),
            InboundBinding::new(
                "channel-rename",
                "channel-rename",
                "channelRenames",
                Pair("channelId", "name"),
            ),
            InboundBinding::new(
                "channel-play_pause",
                "channel-play_pause",
                "channelStatus",
                Tagged,
            ),
            InboundBinding::new(
                "rendition-progress",
                "rendition-progress",
                "renditionProgress",
                Identity,
            ),
            InboundBinding::new("rendition-create", "rendition-create", "playlistAddition", Identity),
            InboundBinding::new("rendition-active", "rendition-active", "renditionChange", Identity),
            InboundBinding::new("playlist-change", "playlist-change", "playlistChanges", Identity),
            InboundBinding::new("volume-change", "volume-change", "volumeChange", Identity),
            InboundBinding::new("library-add", "library-add", "libraryRegistration", Identity),
            InboundBinding::new("library-response", "library-response", "libraryResponse", Identity),
            InboundBinding::new(
                "settings-application",
                "settings-application",
                "applicationSettings",
                Settings,
            ),
        ];
        let outbound = vec![
            OutboundBinding::new("volumeChangeRequests", "volume-change", Identity),
            OutboundBinding::new("receiverMuteRequests", "receiver-mute", Identity),
            OutboundBinding::new("playPauseChanges", "channel-play_pause", Identity),
            OutboundBinding::new("channelNameChanges", "channel-rename", Identity),
            OutboundBinding::new("receiverNameChanges", "receiver-rename", Identity),
            OutboundBinding::new("channelClearPlaylist", "playlist-clear", Identity),
            OutboundBinding::new("playlistSkipRequests", "playlist-skip", Identity),
            OutboundBinding::new("playlistRemoveRequests", "rendition-remove", Identity),
            OutboundBinding::new("attachReceiverRequests", "receiver-attach", Identity),
            OutboundBinding::new("libraryRequests", "library-request", Identity),
            OutboundBinding::new("addChannelRequests", "channel-add", Identity),
            OutboundBinding::new("removeChannelRequests", "channel-remove", Identity),
            OutboundBinding::new("settingsRequests", "settings-retrieve", Identity),
            OutboundBinding::new("settingsSave", "settings-save", Identity),
        ];
        Self::new(inbound, outbound)
    }

    /// The legacy underscore wire vocabulary.
    ///
    /// Same ports and canonical names as [`BindingTable::current`]; only the
    /// wire spellings differ, plus a few events the current vocabulary
    /// dropped.
    pub fn legacy() -> BridgeResult<Self> {
        use Transform::*;
        let inbound = vec![
            InboundBinding::new("state", STARTUP_TAG, "broadcasterState", Startup),
            InboundBinding::new("receiver_added", "receiver-add", "receiverStatus", Tagged),
            InboundBinding::new("receiver_removed", "receiver-remove", "receiverStatus", Tagged),
            InboundBinding::new("reattach_receiver", "receiver-reattach", "receiverStatus", Tagged),
            InboundBinding::new("receiver_online", "receiver-online", "receiverPresence", Identity),
            InboundBinding::new(
                "receiver_connected",
                "receiver-online",
                "receiverPresence",
                Identity,
            ),
            InboundBinding::new(
                "receiver_rename",
                "receiver-rename",
                "receiverRenames",
                Pair("receiverId", "name"),
            ),
            InboundBinding::new(
                "receiver_muted",
                "receiver-mute",
                "receiverMuting",
                Pair("receiverId", "muted"),
            ),
            InboundBinding::new("channel_added", "channel-add", "channelAdditions", Identity),
            InboundBinding::new("channel_removed", "channel-remove", "channelRemovals", Field("id")),
            InboundBinding::new(
                "channel_rename",
                "channel-rename",
                "channelRenames",
                Pair("channelId", "name"),
            ),
            InboundBinding::new(
                "channel_play_pause",
                "channel-play_pause",
                "channelStatus",
                Tagged,
            ),
            InboundBinding::new(
                "rendition_progress",
                "rendition-progress",
                "renditionProgress",
                Identity,
            ),
            InboundBinding::new(
                "new_rendition_created",
                "rendition-create",
                "playlistAddition",
                Identity,
            ),
            InboundBinding::new("rendition_changed", "rendition-active", "renditionChange", Identity),
            InboundBinding::new("volume_change", "volume-change", "volumeChange", Identity),
            InboundBinding::new("add_library", "library-add", "libraryRegistration", Identity),
            InboundBinding::new("library", "library-response", "libraryResponse", Identity),
            InboundBinding::new(
                "application_settings",
                "settings-application",
                "applicationSettings",
                Settings,
            ),
        ];
        let outbound = vec![
            OutboundBinding::new("volumeChangeRequests", "change_volume", Identity),
            OutboundBinding::new("receiverMuteRequests", "mute_receiver", Identity),
            OutboundBinding::new("playPauseChanges", "play_pause", Identity),
            OutboundBinding::new("channelNameChanges", "rename_channel", Identity),
            OutboundBinding::new("receiverNameChanges", "rename_receiver", Identity),
            OutboundBinding::new("channelClearPlaylist", "clear_playlist", Identity),
            OutboundBinding::new("playlistSkipRequests", "skip_track", Identity),
            OutboundBinding::new("playlistRemoveRequests", "remove_rendition", Identity),
            OutboundBinding::new("attachReceiverRequests", "attach_receiver", Identity),
            OutboundBinding::new("libraryRequests", "library", Identity),
            OutboundBinding::new("addChannelRequests", "add_channel", Identity),
            OutboundBinding::new("removeChannelRequests", "remove_channel", Identity),
            OutboundBinding::new("settingsRequests", "retrieve_settings", Identity),
            OutboundBinding::new("settingsSave", "save_settings", Identity),
        ];
        Self::new(inbound, outbound)
    }
}

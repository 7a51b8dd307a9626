//! Wire envelopes.
//!
//! Outbound: one top-level key naming the operation plus an optional `cid`:
//!
//! ```json
//! {"cid": "4", "match_join": {"match_id": "..."}}
//! ```
//!
//! Inbound: a reply (`cid` + payload), a failed reply (`cid` + `error`), or a
//! push (no `cid`, one of the [`PushKind`] keys).

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{RealtimeError, Result};
use crate::messages::{
    ChannelJoin, ChannelLeave, ChannelMessageSend, MatchCreate, MatchDataSend, MatchJoin,
    MatchLeave, MatchmakerAdd, MatchmakerRemove, PartyCreate, PartyDataSend, PartyRef, Ping, Rpc,
    StatusFollow, StatusUnfollow, StatusUpdate,
};

/// An outbound message with its optional correlation id.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope {
    /// Correlation id; present only when a reply is awaited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    /// The operation.
    #[serde(flatten)]
    pub message: OutboundMessage,
}

impl Envelope {
    /// Serialize to the JSON text sent on the link.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RealtimeError::Decode(format!("encode envelope: {e}")))
    }
}

/// Every operation the client can send.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum OutboundMessage {
    MatchCreate(MatchCreate),
    MatchJoin(MatchJoin),
    MatchLeave(MatchLeave),
    MatchDataSend(MatchDataSend),
    ChannelJoin(ChannelJoin),
    ChannelLeave(ChannelLeave),
    ChannelMessageSend(ChannelMessageSend),
    PartyCreate(PartyCreate),
    PartyJoin(PartyRef),
    PartyLeave(PartyRef),
    PartyDataSend(PartyDataSend),
    MatchmakerAdd(MatchmakerAdd),
    MatchmakerRemove(MatchmakerRemove),
    StatusFollow(StatusFollow),
    StatusUnfollow(StatusUnfollow),
    StatusUpdate(StatusUpdate),
    Rpc(Rpc),
    Ping(Ping),
}

impl OutboundMessage {
    /// Wire key of this operation.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MatchCreate(_) => "match_create",
            Self::MatchJoin(_) => "match_join",
            Self::MatchLeave(_) => "match_leave",
            Self::MatchDataSend(_) => "match_data_send",
            Self::ChannelJoin(_) => "channel_join",
            Self::ChannelLeave(_) => "channel_leave",
            Self::ChannelMessageSend(_) => "channel_message_send",
            Self::PartyCreate(_) => "party_create",
            Self::PartyJoin(_) => "party_join",
            Self::PartyLeave(_) => "party_leave",
            Self::PartyDataSend(_) => "party_data_send",
            Self::MatchmakerAdd(_) => "matchmaker_add",
            Self::MatchmakerRemove(_) => "matchmaker_remove",
            Self::StatusFollow(_) => "status_follow",
            Self::StatusUnfollow(_) => "status_unfollow",
            Self::StatusUpdate(_) => "status_update",
            Self::Rpc(_) => "rpc",
            Self::Ping(_) => "ping",
        }
    }
}

/// Error body of a failed reply or an uncorrelated server error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerError {
    /// Server error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Extra detail.
    pub context: HashMap<String, String>,
}

impl From<ServerError> for RealtimeError {
    fn from(err: ServerError) -> Self {
        Self::ErrorReply {
            code: err.code,
            message: err.message,
            context: err.context,
        }
    }
}

/// A server notification delivered over the socket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notification {
    /// Notification id.
    pub id: String,
    /// Subject line.
    pub subject: String,
    /// JSON-encoded content.
    pub content: String,
    /// Application code.
    pub code: i32,
    /// Sending user, if any.
    pub sender_id: String,
    /// Creation time, RFC 3339.
    pub create_time: String,
    /// Stored server-side.
    pub persistent: bool,
}

/// A batch of notifications.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationBatch {
    /// The notifications.
    pub notifications: Vec<Notification>,
}

/// A decoded inbound message.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct InboundEnvelope {
    /// Correlation id echoed from the request.
    #[serde(default)]
    pub cid: Option<String>,
    /// Error body, for failed replies.
    #[serde(default)]
    pub error: Option<ServerError>,
    /// Notification batch, for `notifications` pushes.
    #[serde(default)]
    pub notifications: Option<NotificationBatch>,
    /// Every other top-level key, opaque to the transport.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl InboundEnvelope {
    /// Decode one inbound frame.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let mut envelope: Self =
            serde_json::from_slice(frame).map_err(|e| RealtimeError::Decode(e.to_string()))?;
        // An empty cid is the same as none
        if envelope.cid.as_deref() == Some("") {
            envelope.cid = None;
        }
        Ok(envelope)
    }

    /// Classify an uncorrelated message.
    pub fn push_kind(&self) -> PushKind {
        if self.notifications.is_some() {
            return PushKind::Notifications;
        }
        self.payload
            .keys()
            .find_map(|key| PushKind::from_key(key))
            .unwrap_or_else(|| {
                PushKind::Other(self.payload.keys().next().cloned().unwrap_or_default())
            })
    }

    /// Deserialize the payload stored under `key`.
    pub fn payload_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .payload
            .get(key)
            .ok_or_else(|| RealtimeError::Decode(format!("message has no `{key}` payload")))?;
        T::deserialize(value).map_err(|e| RealtimeError::Decode(format!("`{key}` payload: {e}")))
    }
}

/// Kinds of unsolicited server push.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum PushKind {
    ChannelMessage,
    ChannelPresenceEvent,
    MatchData,
    MatchPresenceEvent,
    MatchmakerMatched,
    Notifications,
    PartyData,
    PartyPresenceEvent,
    PartyClose,
    StatusPresenceEvent,
    StreamData,
    StreamPresenceEvent,
    /// Unrecognised key (empty if the message had no payload).
    Other(String),
}

impl PushKind {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "channel_message" => Self::ChannelMessage,
            "channel_presence_event" => Self::ChannelPresenceEvent,
            "match_data" => Self::MatchData,
            "match_presence_event" => Self::MatchPresenceEvent,
            "matchmaker_matched" => Self::MatchmakerMatched,
            "notifications" => Self::Notifications,
            "party_data" => Self::PartyData,
            "party_presence_event" => Self::PartyPresenceEvent,
            "party_close" => Self::PartyClose,
            "status_presence_event" => Self::StatusPresenceEvent,
            "stream_data" => Self::StreamData,
            "stream_presence_event" => Self::StreamPresenceEvent,
            _ => return None,
        })
    }

    /// Wire key of this push.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ChannelMessage => "channel_message",
            Self::ChannelPresenceEvent => "channel_presence_event",
            Self::MatchData => "match_data",
            Self::MatchPresenceEvent => "match_presence_event",
            Self::MatchmakerMatched => "matchmaker_matched",
            Self::Notifications => "notifications",
            Self::PartyData => "party_data",
            Self::PartyPresenceEvent => "party_presence_event",
            Self::PartyClose => "party_close",
            Self::StatusPresenceEvent => "status_presence_event",
            Self::StreamData => "stream_data",
            Self::StreamPresenceEvent => "stream_presence_event",
            Self::Other(key) => key,
        }
    }
}

impl fmt::Display for PushKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

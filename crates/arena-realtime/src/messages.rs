//! Request bodies and reply payloads carried inside envelopes.
//!
//! Field names follow the server's snake_case JSON. 64-bit op codes travel as
//! decimal strings and binary data as standard base64.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};

// ─────────────────────────────────────────────────────────────────────────────
// Shared
// ─────────────────────────────────────────────────────────────────────────────

/// A user connected to a match, channel, party or status stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPresence {
    /// User id.
    pub user_id: String,
    /// Socket session id of this particular connection.
    pub session_id: String,
    /// Username.
    pub username: String,
    /// Whether messages from this presence are persisted.
    pub persistence: bool,
    /// Status text, for status presences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Kind of chat channel to join.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelType {
    /// Named room.
    Room = 1,
    /// Direct messages with one user.
    DirectMessage = 2,
    /// Group chat.
    Group = 3,
}

impl Serialize for ChannelType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

mod op_code {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

mod base64_data {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound bodies
// ─────────────────────────────────────────────────────────────────────────────

/// Create a relayed match.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MatchCreate {
    /// Optional name; matches with the same name are the same match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Join a match by id or by matchmaker token.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MatchJoin {
    /// Match id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    /// Matchmaker token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Metadata passed to the match handler.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Leave a match.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchLeave {
    /// Match id.
    pub match_id: String,
}

/// Send data to a match.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchDataSend {
    /// Match id.
    pub match_id: String,
    /// Application op code.
    #[serde(with = "op_code")]
    pub op_code: i64,
    /// Opaque payload.
    #[serde(with = "base64_data")]
    pub data: Bytes,
    /// Recipients; empty means everyone in the match.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub presences: Vec<UserPresence>,
    /// Reliable delivery.
    pub reliable: bool,
}

/// Join a chat channel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelJoin {
    /// Room name, user id or group id depending on `type`.
    pub target: String,
    /// Channel kind.
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    /// Persist messages.
    pub persistence: bool,
    /// Hide this presence from other members.
    pub hidden: bool,
}

/// Leave a chat channel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelLeave {
    /// Channel id.
    pub channel_id: String,
}

/// Send a chat message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelMessageSend {
    /// Channel id.
    pub channel_id: String,
    /// JSON-encoded message content.
    pub content: String,
}

/// Create a party.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartyCreate {
    /// Anyone may join without approval.
    pub open: bool,
    /// Maximum number of members.
    pub max_size: u32,
}

/// Join or leave a party.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartyRef {
    /// Party id.
    pub party_id: String,
}

/// Send data to a party.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartyDataSend {
    /// Party id.
    pub party_id: String,
    /// Application op code.
    #[serde(with = "op_code")]
    pub op_code: i64,
    /// Opaque payload.
    #[serde(with = "base64_data")]
    pub data: Bytes,
}

/// Enter the matchmaker pool.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchmakerAdd {
    /// Minimum match size.
    pub min_count: u32,
    /// Maximum match size.
    pub max_count: u32,
    /// Query over other tickets' properties.
    pub query: String,
    /// String properties of this ticket.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub string_properties: HashMap<String, String>,
    /// Numeric properties of this ticket.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub numeric_properties: HashMap<String, f64>,
}

impl Default for MatchmakerAdd {
    fn default() -> Self {
        Self {
            min_count: 2,
            max_count: 8,
            query: "*".to_string(),
            string_properties: HashMap::new(),
            numeric_properties: HashMap::new(),
        }
    }
}

/// Leave the matchmaker pool.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchmakerRemove {
    /// Ticket returned by `matchmaker_add`.
    pub ticket: String,
}

/// Follow users' status.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatusFollow {
    /// User ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<String>,
    /// Usernames.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub usernames: Vec<String>,
}

/// Stop following users.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusUnfollow {
    /// User ids.
    pub user_ids: Vec<String>,
}

/// Update this user's status. `None` appears offline.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatusUpdate {
    /// Status text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Call a server function. Also the `rpc` reply payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rpc {
    /// Function id.
    pub id: String,
    /// Payload, usually JSON text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// HTTP key for server-to-server calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_key: Option<String>,
}

/// Liveness probe.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Ping {}

// ─────────────────────────────────────────────────────────────────────────────
// Reply payloads
// ─────────────────────────────────────────────────────────────────────────────

/// A realtime match (`match` reply key).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Match {
    /// Match id.
    pub match_id: String,
    /// Server-authoritative match.
    pub authoritative: bool,
    /// Match label, if any.
    pub label: Option<String>,
    /// Number of current presences.
    pub size: u32,
    /// Other presences in the match.
    pub presences: Vec<UserPresence>,
    /// This connection's presence.
    #[serde(rename = "self")]
    pub self_presence: Option<UserPresence>,
}

/// A joined chat channel (`channel` reply key).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Channel {
    /// Channel id.
    pub id: String,
    /// Members currently present.
    pub presences: Vec<UserPresence>,
    /// This connection's presence.
    #[serde(rename = "self")]
    pub self_presence: Option<UserPresence>,
    /// Room name, for rooms.
    pub room_name: Option<String>,
    /// Group id, for group channels.
    pub group_id: Option<String>,
}

/// Acknowledgement of a sent chat message (`channel_message_ack` reply key).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelMessageAck {
    /// Channel id.
    pub channel_id: String,
    /// Id assigned to the message.
    pub message_id: String,
    /// Sender username.
    pub username: String,
    /// Creation time, RFC 3339.
    pub create_time: String,
    /// Whether the message was persisted.
    pub persistent: bool,
}

/// A party (`party` reply key).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Party {
    /// Party id.
    pub party_id: String,
    /// Open to join without approval.
    pub open: bool,
    /// Maximum number of members.
    pub max_size: u32,
    /// This connection's presence.
    #[serde(rename = "self")]
    pub self_presence: Option<UserPresence>,
    /// Current leader.
    pub leader: Option<UserPresence>,
    /// Current members.
    pub presences: Vec<UserPresence>,
}

/// A matchmaker ticket (`matchmaker_ticket` reply key).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatchmakerTicket {
    /// Ticket id.
    pub ticket: String,
}

/// Current status of followed users (`status` reply key).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Status {
    /// Online presences of followed users.
    pub presences: Vec<UserPresence>,
}

/// Data pushed from a match (`match_data` push key).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MatchData {
    /// Match id.
    pub match_id: String,
    /// Sender, absent for server-originated data.
    #[serde(default)]
    pub presence: Option<UserPresence>,
    /// Application op code.
    #[serde(with = "op_code")]
    pub op_code: i64,
    /// Opaque payload.
    #[serde(with = "base64_data", default)]
    pub data: Bytes,
    /// Sent reliably.
    #[serde(default)]
    pub reliable: bool,
}

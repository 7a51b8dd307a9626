//! Typed operations over the realtime link.
//!
//! Each method builds one [`OutboundMessage`], sends it through the
//! correlation path and decodes the reply body. Methods whose reply carries
//! nothing return `()`. `send_match_data` and `send_party_data` are
//! fire-and-forget.

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::RealtimeClient;
use crate::envelope::{InboundEnvelope, OutboundMessage};
use crate::errors::{RealtimeError, Result};
use crate::messages::{
    Channel, ChannelJoin, ChannelLeave, ChannelMessageAck, ChannelMessageSend, ChannelType, Match,
    MatchCreate, MatchDataSend, MatchJoin, MatchLeave, MatchmakerAdd, MatchmakerRemove,
    MatchmakerTicket, Party, PartyCreate, PartyDataSend, PartyRef, Ping, Rpc, Status,
    StatusFollow, StatusUnfollow, StatusUpdate, UserPresence,
};

fn expect_reply<T: DeserializeOwned>(reply: &InboundEnvelope, key: &str) -> Result<T> {
    reply.payload_as(key)
}

impl RealtimeClient {
    async fn call(&self, message: OutboundMessage) -> Result<()> {
        self.request(message).await.map(|_| ())
    }

    // ── matches ─────────────────────────────────────────────────────

    /// Create a relayed match, optionally named.
    pub async fn create_match(&self, name: Option<&str>) -> Result<Match> {
        let reply = self
            .request(OutboundMessage::MatchCreate(MatchCreate {
                name: name.map(str::to_owned),
            }))
            .await?;
        expect_reply(&reply, "match")
    }

    /// Join a match by id.
    pub async fn join_match(
        &self,
        match_id: &str,
        metadata: HashMap<String, String>,
    ) -> Result<Match> {
        let reply = self
            .request(OutboundMessage::MatchJoin(MatchJoin {
                match_id: Some(match_id.to_owned()),
                token: None,
                metadata,
            }))
            .await?;
        expect_reply(&reply, "match")
    }

    /// Join a match with a matchmaker token.
    pub async fn join_match_by_token(&self, token: &str) -> Result<Match> {
        let reply = self
            .request(OutboundMessage::MatchJoin(MatchJoin {
                match_id: None,
                token: Some(token.to_owned()),
                metadata: HashMap::new(),
            }))
            .await?;
        expect_reply(&reply, "match")
    }

    /// Leave a match.
    pub async fn leave_match(&self, match_id: &str) -> Result<()> {
        self.call(OutboundMessage::MatchLeave(MatchLeave {
            match_id: match_id.to_owned(),
        }))
        .await
    }

    /// Send match state to `presences`, or to everyone when empty.
    pub async fn send_match_data(
        &self,
        match_id: &str,
        op_code: i64,
        data: impl Into<Bytes>,
        presences: Vec<UserPresence>,
        reliable: bool,
    ) -> Result<()> {
        self.send(OutboundMessage::MatchDataSend(MatchDataSend {
            match_id: match_id.to_owned(),
            op_code,
            data: data.into(),
            presences,
            reliable,
        }))
        .await
    }

    // ── chat ────────────────────────────────────────────────────────

    /// Join a chat channel.
    pub async fn join_chat(
        &self,
        target: &str,
        channel_type: ChannelType,
        persistence: bool,
        hidden: bool,
    ) -> Result<Channel> {
        let reply = self
            .request(OutboundMessage::ChannelJoin(ChannelJoin {
                target: target.to_owned(),
                channel_type,
                persistence,
                hidden,
            }))
            .await?;
        expect_reply(&reply, "channel")
    }

    /// Leave a chat channel.
    pub async fn leave_chat(&self, channel_id: &str) -> Result<()> {
        self.call(OutboundMessage::ChannelLeave(ChannelLeave {
            channel_id: channel_id.to_owned(),
        }))
        .await
    }

    /// Post `content` to a channel. The server expects a JSON object, sent
    /// as a string.
    pub async fn write_chat_message(
        &self,
        channel_id: &str,
        content: &Value,
    ) -> Result<ChannelMessageAck> {
        if !content.is_object() {
            return Err(RealtimeError::Decode(
                "chat content must be a JSON object".into(),
            ));
        }
        let reply = self
            .request(OutboundMessage::ChannelMessageSend(ChannelMessageSend {
                channel_id: channel_id.to_owned(),
                content: content.to_string(),
            }))
            .await?;
        expect_reply(&reply, "channel_message_ack")
    }

    // ── parties ─────────────────────────────────────────────────────

    /// Create a party led by this user.
    pub async fn create_party(&self, open: bool, max_size: u32) -> Result<Party> {
        let reply = self
            .request(OutboundMessage::PartyCreate(PartyCreate { open, max_size }))
            .await?;
        expect_reply(&reply, "party")
    }

    /// Join (or request to join) a party.
    pub async fn join_party(&self, party_id: &str) -> Result<()> {
        self.call(OutboundMessage::PartyJoin(PartyRef {
            party_id: party_id.to_owned(),
        }))
        .await
    }

    /// Leave a party.
    pub async fn leave_party(&self, party_id: &str) -> Result<()> {
        self.call(OutboundMessage::PartyLeave(PartyRef {
            party_id: party_id.to_owned(),
        }))
        .await
    }

    /// Send data to every party member.
    pub async fn send_party_data(
        &self,
        party_id: &str,
        op_code: i64,
        data: impl Into<Bytes>,
    ) -> Result<()> {
        self.send(OutboundMessage::PartyDataSend(PartyDataSend {
            party_id: party_id.to_owned(),
            op_code,
            data: data.into(),
        }))
        .await
    }

    // ── matchmaker ──────────────────────────────────────────────────

    /// Enter the matchmaker pool.
    pub async fn add_matchmaker(&self, ticket: MatchmakerAdd) -> Result<MatchmakerTicket> {
        let reply = self
            .request(OutboundMessage::MatchmakerAdd(ticket))
            .await?;
        expect_reply(&reply, "matchmaker_ticket")
    }

    /// Withdraw a matchmaker ticket.
    pub async fn remove_matchmaker(&self, ticket: &str) -> Result<()> {
        self.call(OutboundMessage::MatchmakerRemove(MatchmakerRemove {
            ticket: ticket.to_owned(),
        }))
        .await
    }

    // ── status ──────────────────────────────────────────────────────

    /// Follow users' presence. Returns their current presences.
    pub async fn follow_users(&self, user_ids: &[&str], usernames: &[&str]) -> Result<Status> {
        let reply = self
            .request(OutboundMessage::StatusFollow(StatusFollow {
                user_ids: user_ids.iter().map(|&s| s.to_owned()).collect(),
                usernames: usernames.iter().map(|&s| s.to_owned()).collect(),
            }))
            .await?;
        expect_reply(&reply, "status")
    }

    /// Stop following users.
    pub async fn unfollow_users(&self, user_ids: &[&str]) -> Result<()> {
        self.call(OutboundMessage::StatusUnfollow(StatusUnfollow {
            user_ids: user_ids.iter().map(|&s| s.to_owned()).collect(),
        }))
        .await
    }

    /// Set this user's status. `None` appears offline.
    pub async fn update_status(&self, status: Option<&str>) -> Result<()> {
        self.call(OutboundMessage::StatusUpdate(StatusUpdate {
            status: status.map(str::to_owned),
        }))
        .await
    }

    // ── misc ────────────────────────────────────────────────────────

    /// Call a server function.
    pub async fn rpc(&self, id: &str, payload: Option<&str>) -> Result<Rpc> {
        let reply = self
            .request(OutboundMessage::Rpc(Rpc {
                id: id.to_owned(),
                payload: payload.map(str::to_owned),
                http_key: None,
            }))
            .await?;
        expect_reply(&reply, "rpc")
    }

    /// One liveness round trip.
    pub async fn ping(&self) -> Result<()> {
        self.call(OutboundMessage::Ping(Ping::default())).await
    }
}

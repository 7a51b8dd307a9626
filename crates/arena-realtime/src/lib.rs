//! # arena-realtime
//!
//! Realtime socket client for the Arena game backend.
//!
//! One persistent duplex link carries many concurrent request/reply exchanges
//! plus unsolicited server pushes:
//!
//! - **Transport**: [`Dialer`] opens a [`Link`]; [`WsDialer`] speaks WebSocket,
//!   [`MemoryDialer`] uses in-process channels
//! - **Correlation**: every request gets a fresh `cid`, a slot in the
//!   [`PendingRegistry`] and a bounded wait
//! - **Heartbeat**: a periodic `ping` through the same path; one failure tears
//!   the link down
//! - **Lifecycle**: [`RealtimeClient`] moves `Idle → Connecting → Open →
//!   Closing → Idle`, draining pending requests on every teardown
//! - **Events**: pushes, undecodable frames and disconnects go to a single
//!   [`EventHandler`] supplied at build time
//!
//! Typed operations (`create_match`, `join_chat`, `rpc`, ...) are methods on
//! [`RealtimeClient`].

#![deny(unsafe_code)]

pub mod api;
pub mod client;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;
pub mod registry;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::{ConnectionState, RealtimeClient, RealtimeClientBuilder};
pub use envelope::{
    Envelope, InboundEnvelope, Notification, NotificationBatch, OutboundMessage, PushKind,
    ServerError,
};
pub use errors::{RealtimeError, Result};
pub use events::{
    DisconnectCause, EventHandler, EventSender, NoopHandler, RealtimeEvent, event_channel,
};
pub use heartbeat::{HeartbeatResult, LivenessProbe, run_heartbeat};
pub use messages::{
    Channel, ChannelMessageAck, ChannelType, Match, MatchData, MatchmakerAdd, MatchmakerTicket,
    Party, Rpc, Status, UserPresence,
};
pub use reconnect::{ManualReconnect, ReconnectPolicy};
pub use registry::{PendingRegistry, PendingReply};
pub use transport::{
    Dialer, Link, LinkReader, LinkWriter, MemoryDialer, MemoryListener, ServerLink, WsDialer,
    connect_url,
};

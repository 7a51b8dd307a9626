//! Realtime error types.

use std::collections::HashMap;

use arena_settings::SettingsError;
use thiserror::Error;

/// Errors surfaced by the realtime client.
///
/// Every operation returns exactly one of these shapes. The type is `Clone`
/// so one incident can reach both the failing caller and the event handler.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RealtimeError {
    /// Malformed envelope or reply payload.
    #[error("decode error: {0}")]
    Decode(String),
    /// No link is open.
    #[error("not connected")]
    NotConnected,
    /// The link could not be established.
    #[error("connection failed: {reason}")]
    Connection {
        /// Why the connect attempt failed.
        reason: String,
    },
    /// The underlying link rejected a read or write.
    #[error("transport error: {0}")]
    Transport(String),
    /// No reply arrived within the wait bound.
    #[error("request {cid} timed out after {timeout_ms}ms")]
    Timeout {
        /// Correlation id of the abandoned request.
        cid: String,
        /// The bound that elapsed.
        timeout_ms: u64,
    },
    /// The server answered with an error envelope.
    #[error("server error {code}: {message}")]
    ErrorReply {
        /// Server error code, verbatim.
        code: i32,
        /// Server error message, verbatim.
        message: String,
        /// Extra server-supplied detail.
        context: HashMap<String, String>,
    },
    /// A liveness probe failed and the link was torn down.
    #[error("heartbeat timed out")]
    HeartbeatTimeout,
    /// The client settings are unusable.
    #[error("invalid settings: {0}")]
    Settings(String),
}

impl From<SettingsError> for RealtimeError {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err.to_string())
    }
}

impl RealtimeError {
    /// Whether this error came from the server rather than the client side.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ErrorReply { .. })
    }

    pub(crate) fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            reason: reason.into(),
        }
    }
}

/// Result type for realtime operations.
pub type Result<T> = std::result::Result<T, RealtimeError>;

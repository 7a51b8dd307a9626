//! Realtime socket settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing and behavior of the realtime connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// Bound on establishing the socket.
    pub connect_timeout_ms: u64,
    /// Bound on a single socket write.
    pub send_timeout_ms: u64,
    /// Default bound on waiting for a correlated reply.
    pub request_timeout_ms: u64,
    /// Liveness probe period. Also the probe's own reply timeout.
    pub heartbeat_interval_ms: u64,
    /// Broadcast online status to followers on connect.
    pub appear_online: bool,
    /// Capacity of the channel used by `mpsc`-backed event handlers.
    pub event_buffer_size: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            send_timeout_ms: 10_000,
            request_timeout_ms: 10_000,
            heartbeat_interval_ms: 10_000,
            appear_online: true,
            event_buffer_size: 256,
        }
    }
}

impl RealtimeSettings {
    /// [`connect_timeout_ms`](Self::connect_timeout_ms) as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// [`send_timeout_ms`](Self::send_timeout_ms) as a `Duration`.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// [`request_timeout_ms`](Self::request_timeout_ms) as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// [`heartbeat_interval_ms`](Self::heartbeat_interval_ms) as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. `#[serde(default)]` lets a settings
//! file carry only the fields it wants to change.

mod realtime;
mod server;

pub use realtime::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the Arena client.
///
/// ```json
/// {
///   "server": { "host": "game.example.com", "port": 443, "useSsl": true },
///   "realtime": { "heartbeatIntervalMs": 5000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Game server endpoint.
    pub server: ServerSettings,
    /// Realtime socket timing and behavior.
    pub realtime: RealtimeSettings,
}

impl ClientSettings {
    /// Reject values that would make the client unusable.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(SettingsError::InvalidValue("server.host is empty".into()));
        }
        if self.server.port == 0 {
            return Err(SettingsError::InvalidValue("server.port must be non-zero".into()));
        }
        let timeouts = [
            ("realtime.connectTimeoutMs", self.realtime.connect_timeout_ms),
            ("realtime.sendTimeoutMs", self.realtime.send_timeout_ms),
            ("realtime.requestTimeoutMs", self.realtime.request_timeout_ms),
            ("realtime.heartbeatIntervalMs", self.realtime.heartbeat_interval_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!("{name} must be positive")));
            }
        }
        if self.realtime.event_buffer_size == 0 {
            return Err(SettingsError::InvalidValue(
                "realtime.eventBufferSize must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ClientSettings::default().validate().unwrap();
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(ClientSettings::default()).unwrap();
        assert_eq!(json["server"]["useSsl"], false);
        assert_eq!(json["realtime"]["heartbeatIntervalMs"], 10_000);
        assert_eq!(json["realtime"]["appearOnline"], true);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: ClientSettings =
            serde_json::from_str(r#"{"server": {"port": 443}}"#).unwrap();
        assert_eq!(settings.server.port, 443);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.realtime, RealtimeSettings::default());
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut settings = ClientSettings::default();
        settings.realtime.request_timeout_ms = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("requestTimeoutMs"));
    }

    #[test]
    fn empty_host_rejected() {
        let mut settings = ClientSettings::default();
        settings.server.host.clear();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }
}

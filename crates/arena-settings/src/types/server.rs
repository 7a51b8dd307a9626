//! Server endpoint settings.

use serde::{Deserialize, Serialize};

/// Where the game server lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Hostname or IP address.
    pub host: String,
    /// Port for both HTTP and realtime traffic.
    pub port: u16,
    /// Use `wss` instead of `ws`.
    pub use_ssl: bool,
    /// Language tag sent on connect.
    pub lang: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7350,
            use_ssl: false,
            lang: "en".to_string(),
        }
    }
}

impl ServerSettings {
    /// URL scheme for the realtime socket.
    pub fn ws_scheme(&self) -> &'static str {
        if self.use_ssl { "wss" } else { "ws" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoint() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 7350);
        assert!(!s.use_ssl);
        assert_eq!(s.lang, "en");
    }

    #[test]
    fn scheme_follows_ssl_flag() {
        let mut s = ServerSettings::default();
        assert_eq!(s.ws_scheme(), "ws");
        s.use_ssl = true;
        assert_eq!(s.ws_scheme(), "wss");
    }
}

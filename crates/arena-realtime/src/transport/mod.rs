//! The raw duplex link and how to open one.
//!
//! The client never touches a socket directly. It asks a [`Dialer`] for a
//! [`Link`] and owns both halves exclusively for the link's lifetime. Writes
//! go through the [`LinkWriter`] half and are serialized by the client. One
//! read loop drains the [`LinkReader`] half.

pub mod memory;
pub mod ws;

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use arena_settings::ServerSettings;

use crate::errors::Result;

pub use memory::{MemoryDialer, MemoryListener, ServerLink};
pub use ws::WsDialer;

/// Opens links.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Open a link to `url`.
    async fn dial(&self, url: &str) -> Result<Link>;
}

/// Write half of a link.
#[async_trait]
pub trait LinkWriter: Send + 'static {
    /// Write one text frame.
    async fn send(&mut self, frame: String) -> Result<()>;
    /// Close the link. Further sends fail.
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a link.
#[async_trait]
pub trait LinkReader: Send + 'static {
    /// Next inbound frame. `None` once the link is closed cleanly.
    async fn recv(&mut self) -> Option<Result<Bytes>>;
}

/// An open duplex link, split into halves.
pub struct Link {
    /// Write half.
    pub writer: Box<dyn LinkWriter>,
    /// Read half.
    pub reader: Box<dyn LinkReader>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// RFC 3986 unreserved characters pass through; everything else is escaped.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Build the realtime endpoint URL.
///
/// `<scheme>://<host>:<port>/ws?lang=<lang>&status=<bool>&token=<token>`
pub fn connect_url(server: &ServerSettings, token: &str, appear_online: bool) -> String {
    format!(
        "{}://{}:{}/ws?lang={}&status={}&token={}",
        server.ws_scheme(),
        server.host,
        server.port,
        utf8_percent_encode(&server.lang, QUERY_VALUE),
        appear_online,
        utf8_percent_encode(token, QUERY_VALUE),
    )
}

/// Same as [`connect_url`] with the token masked, for logs.
pub(crate) fn redacted_url(server: &ServerSettings, appear_online: bool) -> String {
    // The token is the last query parameter
    format!("{}<redacted>", connect_url(server, "", appear_online))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_url() {
        let server = ServerSettings::default();
        assert_eq!(
            connect_url(&server, "abc.def-ghi_", true),
            "ws://127.0.0.1:7350/ws?lang=en&status=true&token=abc.def-ghi_"
        );
    }

    #[test]
    fn ssl_selects_wss() {
        let server = ServerSettings {
            host: "game.example.com".into(),
            port: 443,
            use_ssl: true,
            lang: "en".into(),
        };
        assert!(connect_url(&server, "t", false).starts_with("wss://game.example.com:443/ws?"));
        assert!(connect_url(&server, "t", false).contains("status=false"));
    }

    #[test]
    fn token_is_percent_encoded() {
        let url = connect_url(&ServerSettings::default(), "a+b/c=", false);
        assert!(url.ends_with("token=a%2Bb%2Fc%3D"));
    }

    #[test]
    fn unreserved_tilde_kept() {
        let url = connect_url(&ServerSettings::default(), "x~y", false);
        assert!(url.ends_with("token=x~y"));
    }

    #[test]
    fn redacted_hides_token() {
        let url = redacted_url(&ServerSettings::default(), true);
        assert!(url.ends_with("token=<redacted>"));
    }
}

//! Shared fixtures for in-crate tests.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;

use arena_session::Session;
use arena_settings::ClientSettings;

use crate::client::RealtimeClient;
use crate::events::{DisconnectCause, RealtimeEvent, event_channel};
use crate::transport::{MemoryDialer, MemoryListener, ServerLink};

/// Unsigned token expiring at `exp`.
pub(crate) fn token(exp: i64) -> String {
    let claims = json!({"exp": exp, "uid": "user-1", "usn": "player"});
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
    )
}

pub(crate) fn session_expiring_at(exp: i64) -> Session {
    Session::new(&token(exp), "", false).unwrap()
}

/// Defaults with the heartbeat pushed out of the way.
pub(crate) fn quiet_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();
    settings.realtime.heartbeat_interval_ms = 600_000;
    settings
}

pub(crate) struct Harness {
    pub(crate) client: RealtimeClient,
    pub(crate) dialer: MemoryDialer,
    pub(crate) listener: MemoryListener,
    pub(crate) events: mpsc::Receiver<RealtimeEvent>,
    pub(crate) disconnects: Arc<Mutex<Vec<DisconnectCause>>>,
}

impl Harness {
    pub(crate) fn new(settings: ClientSettings) -> Self {
        let (dialer, listener) = MemoryDialer::pair();
        let (tx, events) = event_channel(64);
        let disconnects = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&disconnects);
        let client = RealtimeClient::builder(settings)
            .dialer(dialer.clone())
            .event_handler(tx)
            .reconnect_policy(move |cause: &DisconnectCause| sink.lock().push(cause.clone()))
            .build()
            .unwrap();
        Self {
            client,
            dialer,
            listener,
            events,
            disconnects,
        }
    }

    /// Connect with a live session and return the server end. Consumes the
    /// `Connected` event.
    pub(crate) async fn open(&mut self) -> ServerLink {
        let session = session_expiring_at(arena_core::now_secs() + 3600);
        self.client.connect(&session, true).await.unwrap();
        let server = self.listener.accept().await.unwrap();
        assert_eq!(self.events.recv().await, Some(RealtimeEvent::Connected));
        server
    }

    /// Events delivered so far, without waiting.
    pub(crate) fn drain_events(&mut self) -> Vec<RealtimeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

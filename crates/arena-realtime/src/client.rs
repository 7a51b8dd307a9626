//! The realtime client.
//!
//! One [`RealtimeClient`] owns at most one link at a time and moves through
//! `Idle → Connecting → Open → Closing → Idle`. While open, two background
//! tasks run against it:
//!
//! - the **read loop** decodes every inbound frame, resolves correlated
//!   replies through the [`PendingRegistry`], and hands everything else to the
//!   [`EventHandler`]
//! - the **heartbeat** pings through the same correlation path and tears the
//!   link down on the first failed probe
//!
//! Every link gets a generation number. Teardown runs at most once per
//! generation no matter how many of user close, read failure and heartbeat
//! failure race for it, so each incident produces exactly one `Disconnected`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use arena_session::Session;
use arena_settings::ClientSettings;

use crate::envelope::{Envelope, InboundEnvelope, OutboundMessage};
use crate::errors::{RealtimeError, Result};
use crate::events::{
    DisconnectCause, EventHandler, NoopHandler, RealtimeEvent, SharedHandler, event_channel,
};
use crate::heartbeat::{HeartbeatResult, LivenessProbe, run_heartbeat};
use crate::messages::Ping;
use crate::reconnect::{ManualReconnect, ReconnectPolicy};
use crate::registry::PendingRegistry;
use crate::transport::{Dialer, Link, LinkReader, LinkWriter, WsDialer, connect_url, redacted_url};

/// Lifecycle state of the client's link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link.
    Idle,
    /// Dialing.
    Connecting,
    /// Link open; requests may be sent.
    Open,
    /// Tearing down the link.
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        })
    }
}

/// Configures a [`RealtimeClient`]. Everything is fixed at build time.
pub struct RealtimeClientBuilder {
    settings: ClientSettings,
    dialer: Option<Arc<dyn Dialer>>,
    handler: Option<SharedHandler>,
    reconnect: Option<Arc<dyn ReconnectPolicy>>,
}

impl RealtimeClientBuilder {
    /// Use `dialer` instead of [`WsDialer`].
    #[must_use]
    pub fn dialer(mut self, dialer: impl Dialer) -> Self {
        self.dialer = Some(Arc::new(dialer));
        self
    }

    /// Deliver events to `handler` instead of discarding them.
    #[must_use]
    pub fn event_handler(mut self, handler: impl EventHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Deliver events to a bounded channel sized by `eventBufferSize` and
    /// return its receiving end.
    #[must_use]
    pub fn event_channel(mut self) -> (Self, mpsc::Receiver<RealtimeEvent>) {
        let (tx, rx) = event_channel(self.settings.realtime.event_buffer_size);
        self.handler = Some(Arc::new(tx));
        (self, rx)
    }

    /// Call `policy` after non-user disconnects instead of [`ManualReconnect`].
    #[must_use]
    pub fn reconnect_policy(mut self, policy: impl ReconnectPolicy) -> Self {
        self.reconnect = Some(Arc::new(policy));
        self
    }

    /// Build the client. It starts idle.
    ///
    /// Fails with [`RealtimeError::Settings`] if the settings do not pass
    /// [`ClientSettings::validate`].
    pub fn build(self) -> Result<RealtimeClient> {
        self.settings.validate()?;
        Ok(RealtimeClient {
            inner: Arc::new(Inner {
                settings: self.settings,
                dialer: self.dialer.unwrap_or_else(|| Arc::new(WsDialer)),
                handler: self.handler.unwrap_or_else(|| Arc::new(NoopHandler)),
                reconnect: self.reconnect.unwrap_or_else(|| Arc::new(ManualReconnect)),
                registry: PendingRegistry::new(),
                link: Mutex::new(LinkState {
                    state: ConnectionState::Idle,
                    generation: 0,
                    cancel: None,
                }),
                writer: tokio::sync::Mutex::new(None),
            }),
        })
    }
}

/// Realtime socket client.
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

struct LinkState {
    state: ConnectionState,
    generation: u64,
    cancel: Option<CancellationToken>,
}

struct Inner {
    settings: ClientSettings,
    dialer: Arc<dyn Dialer>,
    handler: SharedHandler,
    reconnect: Arc<dyn ReconnectPolicy>,
    registry: Arc<PendingRegistry>,
    link: Mutex<LinkState>,
    // Writes are serialized here, independently of the read loop
    writer: tokio::sync::Mutex<Option<Box<dyn LinkWriter>>>,
}

impl RealtimeClient {
    /// Start configuring a client.
    pub fn builder(settings: ClientSettings) -> RealtimeClientBuilder {
        RealtimeClientBuilder {
            settings,
            dialer: None,
            handler: None,
            reconnect: None,
        }
    }

    /// A WebSocket client that discards events.
    pub fn new(settings: ClientSettings) -> Result<Self> {
        Self::builder(settings).build()
    }

    /// Settings this client was built with.
    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Whether a link is open.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Requests currently awaiting a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.registry.len()
    }

    /// Open the link, authenticating with `session`'s access token.
    ///
    /// Blocks until the link is open or the connect timeout elapses. Fails
    /// with [`RealtimeError::Connection`] if the access token is expired, if
    /// a link is already open or opening, or if dialing fails.
    #[instrument(skip_all, fields(host = %self.inner.settings.server.host, port = self.inner.settings.server.port))]
    pub async fn connect(&self, session: &Session, appear_online: bool) -> Result<()> {
        let inner = &self.inner;
        if session.token().is_empty() || session.is_access_expired(arena_core::now_secs()) {
            warn!(user_id = %session.user_id(), "refusing to connect with an expired session");
            return Err(RealtimeError::connection("session token is expired"));
        }

        let generation = {
            let mut link = inner.link.lock();
            if link.state != ConnectionState::Idle {
                return Err(RealtimeError::connection(format!(
                    "cannot connect while {}",
                    link.state
                )));
            }
            link.state = ConnectionState::Connecting;
            link.generation += 1;
            link.generation
        };

        let server = &inner.settings.server;
        info!(url = %redacted_url(server, appear_online), generation, "connecting");
        let url = connect_url(server, session.token(), appear_online);
        let timeout = inner.settings.realtime.connect_timeout();

        let dialed = match time::timeout(timeout, inner.dialer.dial(&url)).await {
            Ok(dialed) => dialed,
            Err(_) => Err(RealtimeError::connection(format!(
                "connect timed out after {}ms",
                timeout.as_millis()
            ))),
        };
        let Link { writer, reader } = match dialed {
            Ok(link) => link,
            Err(error) => {
                inner.abandon_connect(generation);
                warn!(%error, generation, "connect failed");
                return Err(match error {
                    RealtimeError::Connection { .. } => error,
                    other => RealtimeError::connection(other.to_string()),
                });
            }
        };

        let cancel = CancellationToken::new();
        let mut slot = inner.writer.lock().await;
        let opened = {
            let mut link = inner.link.lock();
            let current = link.generation == generation && link.state == ConnectionState::Connecting;
            if current {
                link.state = ConnectionState::Open;
                link.cancel = Some(cancel.clone());
            }
            current
        };
        if !opened {
            drop(slot);
            let mut writer = writer;
            let _ = writer.close().await;
            debug!(generation, "link discarded, closed while connecting");
            return Err(RealtimeError::connection("closed while connecting"));
        }
        *slot = Some(writer);
        drop(slot);

        info!(generation, "connected");
        inner.emit(RealtimeEvent::Connected);

        let _ = tokio::spawn(read_loop(
            Arc::clone(inner),
            reader,
            generation,
            cancel.clone(),
        ));
        let _ = tokio::spawn(heartbeat_loop(Arc::clone(inner), generation, cancel));
        Ok(())
    }

    /// [`connect`](Self::connect) with the configured `appearOnline` flag.
    pub async fn connect_default(&self, session: &Session) -> Result<()> {
        self.connect(session, self.inner.settings.realtime.appear_online)
            .await
    }

    /// Close the link without firing `Disconnected`. Idempotent.
    ///
    /// Pending requests fail with [`RealtimeError::NotConnected`].
    pub async fn close(&self) {
        self.close_with(false).await;
    }

    /// Close the link and fire `Disconnected { cause: User }`.
    pub async fn close_and_notify(&self) {
        self.close_with(true).await;
    }

    async fn close_with(&self, notify: bool) {
        let generation = {
            let mut link = self.inner.link.lock();
            match link.state {
                ConnectionState::Open => link.generation,
                ConnectionState::Connecting => {
                    // The in-flight connect sees the new generation and backs out
                    link.generation += 1;
                    link.state = ConnectionState::Idle;
                    return;
                }
                ConnectionState::Idle | ConnectionState::Closing => return,
            }
        };
        self.inner
            .teardown(generation, DisconnectCause::User, notify)
            .await;
    }

    /// Send without awaiting a reply.
    pub async fn send(&self, message: OutboundMessage) -> Result<()> {
        self.inner
            .send_envelope(&Envelope { cid: None, message })
            .await
    }

    /// Send and wait for the correlated reply, bounded by the configured
    /// request timeout.
    pub async fn request(&self, message: OutboundMessage) -> Result<InboundEnvelope> {
        let timeout = self.inner.settings.realtime.request_timeout();
        self.inner.request_with_timeout(message, timeout).await
    }

    /// Send and wait for the correlated reply, bounded by `timeout`.
    pub async fn request_with_timeout(
        &self,
        message: OutboundMessage,
        timeout: Duration,
    ) -> Result<InboundEnvelope> {
        self.inner.request_with_timeout(message, timeout).await
    }

    /// Send and wait for the correlated reply until `deadline`.
    pub async fn request_until(
        &self,
        message: OutboundMessage,
        deadline: Instant,
    ) -> Result<InboundEnvelope> {
        let timeout = deadline.saturating_duration_since(Instant::now());
        self.inner.request_with_timeout(message, timeout).await
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(cancel) = self.inner.link.lock().cancel.take() {
            cancel.cancel();
        }
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("state", &self.state())
            .field("pending", &self.pending_requests())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn state(&self) -> ConnectionState {
        self.link.lock().state
    }

    fn emit(&self, event: RealtimeEvent) {
        self.handler.handle(event);
    }

    fn abandon_connect(&self, generation: u64) {
        let mut link = self.link.lock();
        if link.generation == generation && link.state == ConnectionState::Connecting {
            link.state = ConnectionState::Idle;
        }
    }

    async fn send_envelope(&self, envelope: &Envelope) -> Result<()> {
        let frame = envelope.to_json()?;
        if self.state() != ConnectionState::Open {
            return Err(RealtimeError::NotConnected);
        }
        let mut slot = self.writer.lock().await;
        let writer = slot.as_mut().ok_or(RealtimeError::NotConnected)?;
        let timeout = self.settings.realtime.send_timeout();
        match time::timeout(timeout, writer.send(frame)).await {
            Ok(sent) => sent,
            Err(_) => Err(RealtimeError::Transport(format!(
                "send timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn request_with_timeout(
        &self,
        message: OutboundMessage,
        timeout: Duration,
    ) -> Result<InboundEnvelope> {
        // Register before sending so a fast reply always finds its slot
        let pending = self.registry.register();
        let cid = pending.cid().to_owned();
        let kind = message.kind();
        let envelope = Envelope {
            cid: Some(cid.clone()),
            message,
        };

        if let Err(error) = self.send_envelope(&envelope).await {
            debug!(%cid, kind, %error, "request not sent");
            return Err(error);
        }
        trace!(%cid, kind, "request sent");

        let outcome = pending.wait(timeout).await;
        if let Err(RealtimeError::Timeout { .. }) = &outcome {
            debug!(%cid, kind, timeout_ms = timeout.as_millis(), "request timed out");
        }
        outcome
    }

    fn dispatch(&self, frame: Bytes) {
        let mut envelope = match InboundEnvelope::decode(&frame) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%error, len = frame.len(), "undecodable inbound frame");
                self.emit(RealtimeEvent::Undecodable(frame));
                return;
            }
        };

        if let Some(cid) = envelope.cid.clone() {
            let outcome = match envelope.error.take() {
                Some(error) => Err(error.into()),
                None => Ok(envelope),
            };
            if !self.registry.resolve(&cid, outcome) {
                warn!(%cid, "reply for unknown cid dropped");
            }
            return;
        }

        match envelope.error.take() {
            Some(error) => {
                let error = RealtimeError::from(error);
                warn!(%error, "uncorrelated server error");
                self.emit(RealtimeEvent::ServerError(error));
            }
            None => {
                trace!(kind = %envelope.push_kind(), "push received");
                self.emit(RealtimeEvent::Push(envelope));
            }
        }
    }

    /// Close generation `generation`'s link, once.
    async fn teardown(&self, generation: u64, cause: DisconnectCause, notify: bool) {
        let cancel = {
            let mut link = self.link.lock();
            if link.generation != generation || link.state != ConnectionState::Open {
                return;
            }
            link.state = ConnectionState::Closing;
            link.cancel.take()
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if cause == DisconnectCause::HeartbeatTimeout {
            self.emit(RealtimeEvent::HeartbeatTimeout);
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match time::timeout(self.settings.realtime.send_timeout(), writer.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => debug!(%error, "link close failed"),
                Err(_) => debug!("link close timed out"),
            }
        }
        let reason = match &cause {
            DisconnectCause::HeartbeatTimeout => RealtimeError::HeartbeatTimeout,
            DisconnectCause::Error(error) => error.clone(),
            DisconnectCause::User | DisconnectCause::Remote => RealtimeError::NotConnected,
        };
        let drained = self.registry.drain(&reason);
        info!(generation, %cause, drained, "realtime link closed");

        // Idle first so a handler may reconnect from inside the callback
        self.link.lock().state = ConnectionState::Idle;
        if notify {
            self.emit(RealtimeEvent::Disconnected {
                cause: cause.clone(),
            });
        }

        if cause != DisconnectCause::User {
            self.reconnect.on_disconnect(&cause);
        }
    }
}

#[instrument(skip_all, fields(generation = generation))]
async fn read_loop(
    inner: Arc<Inner>,
    mut reader: Box<dyn LinkReader>,
    generation: u64,
    cancel: CancellationToken,
) {
    let cause = loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            frame = reader.recv() => frame,
        };
        match frame {
            Some(Ok(frame)) => inner.dispatch(frame),
            Some(Err(error)) => {
                warn!(%error, "link read failed");
                break DisconnectCause::Error(error);
            }
            None => break DisconnectCause::Remote,
        }
    };
    inner.teardown(generation, cause, true).await;
}

async fn heartbeat_loop(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    let interval = inner.settings.realtime.heartbeat_interval();
    let probe = PingProbe {
        inner: Arc::clone(&inner),
    };
    if let HeartbeatResult::Failed(_) = run_heartbeat(probe, interval, cancel).await {
        inner
            .teardown(generation, DisconnectCause::HeartbeatTimeout, true)
            .await;
    }
}

struct PingProbe {
    inner: Arc<Inner>,
}

#[async_trait]
impl LivenessProbe for PingProbe {
    async fn probe(&self, timeout: Duration) -> Result<()> {
        self.inner
            .request_with_timeout(OutboundMessage::Ping(Ping::default()), timeout)
            .await
            .map(|_| ())
    }
}

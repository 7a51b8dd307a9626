//! Events delivered to the application and the handler that receives them.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::envelope::InboundEnvelope;
use crate::errors::RealtimeError;

/// Why a link went away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The application called `close`.
    User,
    /// The server closed the link.
    Remote,
    /// Reading from the link failed.
    Error(RealtimeError),
    /// A liveness probe failed.
    HeartbeatTimeout,
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("closed by user"),
            Self::Remote => f.write_str("closed by server"),
            Self::Error(err) => write!(f, "link error: {err}"),
            Self::HeartbeatTimeout => f.write_str("heartbeat timed out"),
        }
    }
}

/// Something the application should know about.
#[derive(Clone, Debug, PartialEq)]
pub enum RealtimeEvent {
    /// A link opened.
    Connected,
    /// The link closed. Fired once per link.
    Disconnected {
        /// Why it closed.
        cause: DisconnectCause,
    },
    /// An uncorrelated server push.
    Push(InboundEnvelope),
    /// An inbound frame that could not be decoded.
    Undecodable(Bytes),
    /// An uncorrelated error envelope.
    ServerError(RealtimeError),
    /// A liveness probe failed. Always followed by `Disconnected`.
    HeartbeatTimeout,
}

impl RealtimeEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Push(_) => "push",
            Self::Undecodable(_) => "undecodable",
            Self::ServerError(_) => "server_error",
            Self::HeartbeatTimeout => "heartbeat_timeout",
        }
    }

    fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Connected | Self::Disconnected { .. })
    }
}

/// Receives every [`RealtimeEvent`], in order, from the client's tasks.
///
/// Called inline on the read loop; must not block.
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event.
    fn handle(&self, event: RealtimeEvent);
}

impl<F> EventHandler for F
where
    F: Fn(RealtimeEvent) + Send + Sync + 'static,
{
    fn handle(&self, event: RealtimeEvent) {
        self(event);
    }
}

/// Bounded channel delivery, created by [`event_channel`].
///
/// `Connected` and `Disconnected` are never dropped: when the channel is full
/// they queue behind a forwarder task that waits for room. Every later event
/// queues behind them, so a reconnect's `Connected` cannot overtake the
/// `Disconnected` before it. Other events are dropped with a warning when the
/// channel is full or the queue already holds `capacity` events.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<RealtimeEvent>,
    // Some while a forwarder owns delivery
    backlog: Arc<Mutex<Option<VecDeque<RealtimeEvent>>>>,
}

impl EventSender {
    /// Events waiting for room in the channel.
    pub fn backlog_len(&self) -> usize {
        self.backlog.lock().as_ref().map_or(0, VecDeque::len)
    }

    fn spawn_forwarder(&self, runtime: &Handle) {
        let tx = self.tx.clone();
        let backlog = Arc::clone(&self.backlog);
        let _ = runtime.spawn(async move {
            loop {
                let next = {
                    let mut slot = backlog.lock();
                    match slot.as_mut().and_then(VecDeque::pop_front) {
                        Some(event) => event,
                        None => {
                            *slot = None;
                            return;
                        }
                    }
                };
                if tx.send(next).await.is_err() {
                    debug!("event channel closed, discarding backlog");
                    *backlog.lock() = None;
                    return;
                }
            }
        });
    }
}

impl EventHandler for EventSender {
    fn handle(&self, event: RealtimeEvent) {
        let mut slot = self.backlog.lock();
        if let Some(queue) = slot.as_mut() {
            if event.is_lifecycle() || queue.len() < self.tx.max_capacity() {
                queue.push_back(event);
            } else {
                warn!(event = event.name(), "event backlog full, dropping event");
            }
            return;
        }

        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) if event.is_lifecycle() => {
                match Handle::try_current() {
                    Ok(runtime) => {
                        *slot = Some(VecDeque::from([event]));
                        drop(slot);
                        self.spawn_forwarder(&runtime);
                    }
                    Err(_) => {
                        warn!(event = event.name(), "event channel full outside a runtime, dropping event");
                    }
                }
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(event = event.name(), "event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event channel closed, receiver dropped");
            }
        }
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHandler;

impl EventHandler for NoopHandler {
    fn handle(&self, _event: RealtimeEvent) {}
}

/// A bounded event channel sized for `capacity` events.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<RealtimeEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sender = EventSender {
        tx,
        backlog: Arc::new(Mutex::new(None)),
    };
    (sender, rx)
}

pub(crate) type SharedHandler = Arc<dyn EventHandler>;

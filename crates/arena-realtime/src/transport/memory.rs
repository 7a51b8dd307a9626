//! In-process links backed by channels.
//!
//! [`MemoryDialer`] hands every accepted link's server end to a
//! [`MemoryListener`], so tests can play the server without sockets:
//!
//! ```ignore
//! let (dialer, mut listener) = MemoryDialer::pair();
//! // ... client.connect(&session, true) ...
//! let mut server = listener.accept().await.unwrap();
//! let request = server.recv_json().await.unwrap();
//! server.reply(&request, json!({"pong": {}}));
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{Dialer, Link, LinkReader, LinkWriter};
use crate::errors::{RealtimeError, Result};

#[derive(Clone, Debug)]
enum DialMode {
    Accept,
    Refuse(String),
    Hang,
}

#[derive(Clone, Debug)]
enum WriteMode {
    Deliver,
    Reject(String),
    Stall,
}

enum ServerFrame {
    Data(Bytes),
    Fail(String),
}

/// Dialer whose links terminate in a [`MemoryListener`].
#[derive(Clone)]
pub struct MemoryDialer {
    mode: Arc<Mutex<DialMode>>,
    accepted: mpsc::UnboundedSender<ServerLink>,
}

impl MemoryDialer {
    /// A dialer and the listener that receives its links.
    pub fn pair() -> (Self, MemoryListener) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let dialer = Self {
            mode: Arc::new(Mutex::new(DialMode::Accept)),
            accepted,
        };
        (dialer, MemoryListener { accepted: rx })
    }

    /// Accept subsequent dials (the default).
    pub fn accept(&self) {
        *self.mode.lock() = DialMode::Accept;
    }

    /// Fail subsequent dials with `reason`.
    pub fn refuse(&self, reason: impl Into<String>) {
        *self.mode.lock() = DialMode::Refuse(reason.into());
    }

    /// Never complete subsequent dials.
    pub fn hang(&self) {
        *self.mode.lock() = DialMode::Hang;
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self, url: &str) -> Result<Link> {
        let mode = self.mode.lock().clone();
        match mode {
            DialMode::Accept => {}
            DialMode::Refuse(reason) => return Err(RealtimeError::connection(reason)),
            DialMode::Hang => std::future::pending::<()>().await,
        }

        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        let writes = Arc::new(Mutex::new(WriteMode::Deliver));
        let server = ServerLink {
            url: url.to_owned(),
            from_client,
            to_client,
            writes: Arc::clone(&writes),
        };
        self.accepted
            .send(server)
            .map_err(|_| RealtimeError::connection("listener dropped"))?;

        Ok(Link {
            writer: Box::new(MemoryWriter {
                to_server: Some(to_server),
                writes,
            }),
            reader: Box::new(MemoryReader { from_server }),
        })
    }
}

/// Receives the server end of each link a [`MemoryDialer`] opens.
pub struct MemoryListener {
    accepted: mpsc::UnboundedReceiver<ServerLink>,
}

impl MemoryListener {
    /// Wait for the next link. `None` once every dialer clone is dropped.
    pub async fn accept(&mut self) -> Option<ServerLink> {
        self.accepted.recv().await
    }
}

/// The server end of an in-memory link.
///
/// Dropping it closes the link as seen by the client.
pub struct ServerLink {
    url: String,
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<ServerFrame>,
    writes: Arc<Mutex<WriteMode>>,
}

impl ServerLink {
    /// URL the client dialed.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Next frame from the client. `None` once the client closed its writer.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next frame from the client, parsed as JSON.
    pub async fn recv_json(&mut self) -> Option<Value> {
        let frame = self.recv().await?;
        serde_json::from_str(&frame).ok()
    }

    /// Send raw bytes to the client.
    pub fn send_bytes(&self, frame: impl Into<Bytes>) -> bool {
        self.to_client.send(ServerFrame::Data(frame.into())).is_ok()
    }

    /// Send a JSON value to the client.
    pub fn send_json(&self, value: &Value) -> bool {
        self.send_bytes(value.to_string())
    }

    /// Answer `request`, copying its `cid` onto `body`.
    pub fn reply(&self, request: &Value, mut body: Value) -> bool {
        if let (Some(cid), Some(map)) = (request.get("cid"), body.as_object_mut()) {
            let _ = map.insert("cid".to_owned(), cid.clone());
        }
        self.send_json(&body)
    }

    /// Make the client's next read fail with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self.to_client.send(ServerFrame::Fail(reason.to_owned()));
    }

    /// Fail the client's subsequent sends with a transport error.
    pub fn reject_writes(&self, reason: impl Into<String>) {
        *self.writes.lock() = WriteMode::Reject(reason.into());
    }

    /// Never complete the client's subsequent sends.
    pub fn stall_writes(&self) {
        *self.writes.lock() = WriteMode::Stall;
    }

    /// Deliver the client's sends again (the default).
    pub fn deliver_writes(&self) {
        *self.writes.lock() = WriteMode::Deliver;
    }

    /// Close the link from the server side.
    pub fn close(self) {
        drop(self);
    }
}

struct MemoryWriter {
    to_server: Option<mpsc::UnboundedSender<String>>,
    writes: Arc<Mutex<WriteMode>>,
}

#[async_trait]
impl LinkWriter for MemoryWriter {
    async fn send(&mut self, frame: String) -> Result<()> {
        let Some(tx) = &self.to_server else {
            return Err(RealtimeError::Transport("link closed".into()));
        };
        let mode = self.writes.lock().clone();
        match mode {
            WriteMode::Deliver => {}
            WriteMode::Reject(reason) => return Err(RealtimeError::Transport(reason)),
            WriteMode::Stall => std::future::pending::<()>().await,
        }
        tx.send(frame)
            .map_err(|_| RealtimeError::Transport("link closed by peer".into()))
    }

    async fn close(&mut self) -> Result<()> {
        self.to_server = None;
        Ok(())
    }
}

struct MemoryReader {
    from_server: mpsc::UnboundedReceiver<ServerFrame>,
}

#[async_trait]
impl LinkReader for MemoryReader {
    async fn recv(&mut self) -> Option<Result<Bytes>> {
        match self.from_server.recv().await? {
            ServerFrame::Data(bytes) => Some(Ok(bytes)),
            ServerFrame::Fail(reason) => Some(Err(RealtimeError::Transport(reason))),
        }
    }
}

//! Connection abstraction — the transport seam under the room registry.
//!
//! DESIGN
//! ======
//! Rooms and sessions only ever see `Arc<dyn Connection>`. The production
//! implementation wraps an upgraded axum `WebSocket`; tests substitute
//! `test_helpers::MockConnection`. Identity is the `ConnId` minted when the
//! handle is created, so two clones of the same `Arc` are the same member.
//!
//! WRITE PATH
//! ==========
//! `WsConnection` splits the socket. A writer task owns the sink and drains a
//! bounded channel; `send` only enqueues (`try_send`). A full buffer surfaces
//! as `ConnError::Backpressure` to the caller instead of stalling it, which
//! keeps room broadcasts from waiting on the slowest peer. Once `close` has
//! queued the close frame every later `send` fails with `ConnError::Closed`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

/// Stable identity of one accepted channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Websocket data frame kind. Relayed messages keep the kind they arrived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Binary,
}

/// One data message travelling over a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: MessageKind,
    pub payload: Bytes,
}

impl Envelope {
    #[must_use]
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self { kind: MessageKind::Text, payload: payload.into() }
    }

    #[must_use]
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self { kind: MessageKind::Binary, payload: payload.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    #[error("connection closed")]
    Closed,
    #[error("outbound buffer full")]
    Backpressure,
    #[error("text payload is not valid utf-8")]
    InvalidUtf8,
    #[error("transport error: {0}")]
    Transport(String),
}

// =============================================================================
// CONNECTION TRAIT
// =============================================================================

/// Capability interface over an established bidirectional message channel.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Identity used as the room-membership key.
    fn id(&self) -> ConnId;

    /// Deliver one message to the remote end.
    async fn send(&self, envelope: Envelope) -> Result<(), ConnError>;

    /// Wait for the next data message. `Err` means the channel is finished.
    async fn recv(&self) -> Result<Envelope, ConnError>;

    /// Close the channel. Closing twice is harmless.
    async fn close(&self) -> Result<(), ConnError>;
}

// =============================================================================
// WEBSOCKET CONNECTION
// =============================================================================

/// `Connection` over an upgraded axum websocket.
pub struct WsConnection {
    id: ConnId,
    outbound: mpsc::Sender<Message>,
    inbound: Mutex<SplitStream<WebSocket>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl WsConnection {
    /// Split `socket` and spawn its writer task. `buffer` bounds the number of
    /// queued outbound messages before sends start failing with backpressure.
    #[must_use]
    pub fn new(socket: WebSocket, buffer: usize) -> Self {
        let id = ConnId::new();
        let (sink, stream) = socket.split();
        let (outbound, rx) = mpsc::channel(buffer.max(1));
        let writer = tokio::spawn(run_writer(id, sink, rx));
        Self {
            id,
            outbound,
            inbound: Mutex::new(stream),
            writer: Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
        }
    }
}

async fn run_writer(id: ConnId, mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            debug!(conn_id = %id, error = %e, "ws: writer send failed");
            break;
        }
        if is_close {
            break;
        }
    }
    let _ = sink.close().await;
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> ConnId {
        self.id
    }

    async fn send(&self, envelope: Envelope) -> Result<(), ConnError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ConnError::Closed);
        }
        let msg = match envelope.kind {
            MessageKind::Text => {
                let text = String::from_utf8(envelope.payload.to_vec()).map_err(|_| ConnError::InvalidUtf8)?;
                Message::Text(text.into())
            }
            MessageKind::Binary => Message::Binary(envelope.payload),
        };
        self.outbound.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ConnError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => ConnError::Closed,
        })
    }

    async fn recv(&self) -> Result<Envelope, ConnError> {
        let mut stream = self.inbound.lock().await;
        loop {
            let Some(msg) = stream.next().await else {
                return Err(ConnError::Closed);
            };
            match msg.map_err(|e| ConnError::Transport(e.to_string()))? {
                Message::Text(text) => return Ok(Envelope::text(text.as_str().to_owned())),
                Message::Binary(bytes) => return Ok(Envelope::binary(bytes)),
                Message::Close(_) => return Err(ConnError::Closed),
                // Pings are answered by the protocol layer.
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }

    async fn close(&self) -> Result<(), ConnError> {
        self.closed.store(true, Ordering::Release);
        let Some(writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        if self.outbound.try_send(Message::Close(None)).is_err() {
            // Writer is gone or wedged behind a full buffer; stop it outright.
            warn!(conn_id = %self.id, "ws: close frame not queued, aborting writer");
            writer.abort();
        }
        Ok(())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "conn_test.rs"]
mod tests;

//! Transport endpoints owned by hubs
//!
//! A [`Connection`] is the write side of a live client transport. Until it is
//! registered it belongs to the accept task; after `Hub::register` the hub loop
//! owns it exclusively and is the only place that writes to or closes it.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::stream::SplitSink;
use futures::{Sink, SinkExt};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A serialized outbound text frame. Cheap to clone, so one serialization is
/// shared by every connection a publish reaches.
pub type Frame = Utf8Bytes;

/// Identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a write to a connection failed
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),
}

/// Write half of a client transport.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Write one text frame.
    async fn send_text(&mut self, frame: Frame) -> Result<(), ConnectionError>;

    /// Write a Ping frame. The peer's Pong arrives on the read side.
    async fn send_ping(&mut self) -> Result<(), ConnectionError>;

    /// Close the transport. Calling it more than once is harmless.
    async fn close(&mut self);
}

/// [`Connection`] over the sink half of an axum WebSocket.
///
/// Closing (or dropping) the connection cancels `shutdown`, which ends the
/// reader task holding the stream half.
pub struct WsConnection<S = SplitSink<WebSocket, Message>> {
    sink: S,
    shutdown: CancellationToken,
    write_timeout: Duration,
    closed: bool,
}

impl<S> WsConnection<S> {
    pub fn new(sink: S, shutdown: CancellationToken, write_timeout: Duration) -> Self {
        Self {
            sink,
            shutdown,
            write_timeout,
            closed: false,
        }
    }
}

impl<S> WsConnection<S>
where
    S: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
{
    async fn write(&mut self, message: Message) -> Result<(), ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        match tokio::time::timeout(self.write_timeout, self.sink.send(message)).await {
            Ok(result) => result.map_err(ConnectionError::from),
            Err(_) => Err(ConnectionError::Timeout(self.write_timeout)),
        }
    }
}

#[async_trait]
impl<S> Connection for WsConnection<S>
where
    S: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
{
    async fn send_text(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        self.write(Message::Text(frame)).await
    }

    async fn send_ping(&mut self) -> Result<(), ConnectionError> {
        self.write(Message::Ping(Bytes::new())).await
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shutdown.cancel();

        // The peer may already be gone; a failed close frame is not an error.
        let sink = &mut self.sink;
        let _ = tokio::time::timeout(self.write_timeout, async move {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        })
        .await;
    }
}

impl<S> Drop for WsConnection<S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// src/connection/transport.rs

//! The transport abstraction the core runs on, and its WebSocket implementation.
//!
//! The hosting side is responsible for upgrading an inbound request to a
//! persistent, message-oriented transport and handing it to the registry. The
//! core only requires the narrow surface below: one message per receive, a
//! closed flag, and an active close.

use crate::core::DevioError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// A persistent, message-oriented connection to one client.
///
/// `recv` returning `Ok(None)` is the end-of-stream signal; closing the
/// transport is the only cancellation mechanism the core uses.
#[async_trait]
pub trait Transport: Send {
    /// Receives one raw message, or `None` once the peer has gone away.
    async fn recv(&mut self) -> Result<Option<String>, DevioError>;

    /// Writes one raw message.
    async fn send(&mut self, raw: &str) -> Result<(), DevioError>;

    /// True once the connection is no longer usable for sending.
    fn is_closed(&self) -> bool;

    /// Actively closes the connection. Idempotent.
    async fn close(&mut self);
}

/// A `Transport` over a server-side WebSocket stream. Each text frame carries
/// exactly one packet.
pub struct WsTransport {
    inner: WebSocketStream<TcpStream>,
    closed: bool,
}

impl WsTransport {
    pub fn new(stream: WebSocketStream<TcpStream>) -> Self {
        Self {
            inner: stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Result<Option<String>, DevioError> {
        if self.closed {
            return Ok(None);
        }

        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
                }
                // Ping/pong frames are answered by tungstenite itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    self.closed = true;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    // Any read error means the peer is gone; the loop treats
                    // this the same as a clean close.
                    debug!(error = %e, "websocket read failed, treating as end of stream");
                    self.closed = true;
                    return Ok(None);
                }
            }
        }
    }

    async fn send(&mut self, raw: &str) -> Result<(), DevioError> {
        if self.closed {
            return Err(DevioError::ConnectionEnded);
        }

        if let Err(e) = self.inner.send(Message::text(raw.to_string())).await {
            warn!(error = %e, "websocket write failed");
            self.closed = true;
            return Err(DevioError::ConnectionEnded);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.inner.close(None).await {
            debug!(error = %e, "error while closing websocket");
        }
    }
}

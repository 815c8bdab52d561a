// src/connection/session.rs

//! Defines `ClientSession`: the server-side state for one live connection,
//! its handshake, receive loop, and send path.

use crate::connection::transport::Transport;
use crate::core::DevioError;
use crate::core::dispatch::EventDispatcher;
use crate::core::protocol::{packet, value};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// The lifecycle of a session. `id` and `type_name` are populated exactly when
/// the phase leaves `Handshaking`; a `Closed` session never accepts a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionPhase {
    Handshaking = 0,
    Connected = 1,
    Closed = 2,
}

impl SessionPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionPhase::Handshaking,
            1 => SessionPhase::Connected,
            _ => SessionPhase::Closed,
        }
    }
}

/// One live client connection.
///
/// The session exclusively owns its transport. Identity (`id`, `type_name`,
/// `data`) is fixed at handshake time and immutable thereafter. The session is
/// driven by exactly one task; `send` is safe to call from handlers running on
/// that task but is not a cross-task fan-in point.
pub struct ClientSession {
    id: String,
    type_name: String,
    data: Value,
    transport: Mutex<Box<dyn Transport>>,
    phase: AtomicU8,
}

impl ClientSession {
    /// Performs the handshake on a fresh transport.
    ///
    /// Blocks on a single receive bounded by `timeout`. The packet must decode
    /// to exactly 3 fields `(id, type, data)` with non-empty `id` and `type`.
    /// On any violation the transport is actively closed and
    /// `HandshakeFailed` is returned; the caller must treat that as "never
    /// produced a usable session".
    pub async fn handshake(
        mut transport: Box<dyn Transport>,
        timeout: Duration,
    ) -> Result<Self, DevioError> {
        let raw = match tokio::time::timeout(timeout, transport.recv()).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                return Err(Self::fail_handshake(transport, "connection ended before handshake")
                    .await);
            }
            Ok(Err(e)) => {
                return Err(Self::fail_handshake(
                    transport,
                    &format!("transport error during handshake: {e}"),
                )
                .await);
            }
            Err(_) => {
                return Err(
                    Self::fail_handshake(transport, "timed out waiting for handshake").await,
                );
            }
        };

        let fields = packet::decode(&raw);
        let actual = fields.len();
        let Ok([id, type_name, data_raw]) = <[String; 3]>::try_from(fields) else {
            return Err(Self::fail_handshake(
                transport,
                &format!("expected 3 handshake fields, got {actual}"),
            )
            .await);
        };

        if id.is_empty() || type_name.is_empty() {
            return Err(
                Self::fail_handshake(transport, "handshake id and type must be non-empty").await,
            );
        }

        debug!(client = %id, device_type = %type_name, "handshake complete");

        Ok(Self {
            id,
            type_name,
            data: value::from_wire(&data_raw),
            transport: Mutex::new(transport),
            phase: AtomicU8::new(SessionPhase::Connected as u8),
        })
    }

    async fn fail_handshake(mut transport: Box<dyn Transport>, reason: &str) -> DevioError {
        warn!(reason, "invalid handshake, ending connection");
        transport.close().await;
        DevioError::HandshakeFailed(reason.to_string())
    }

    /// The client-declared identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The client-declared device-type key.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The free-form payload from the handshake. A parsed JSON document when
    /// the client sent one, otherwise the raw string.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Sends one `(event, message)` packet to the client.
    ///
    /// The message kind is validated before any I/O: `UnsendableValue` for a
    /// kind outside the sendable set, `ConnectionEnded` when the transport is
    /// already closed.
    pub async fn send(&self, event: &str, message: &Value) -> Result<(), DevioError> {
        let wire = value::to_wire(message)?;

        let mut transport = self.transport.lock().await;
        if self.phase() == SessionPhase::Closed || transport.is_closed() {
            return Err(DevioError::ConnectionEnded);
        }

        debug!(client = %self.id, event, "sending message");
        transport.send(&packet::encode([event, wire.as_str()])).await
    }

    /// Actively closes the session's transport. Idempotent.
    pub async fn close(&self) {
        self.phase
            .store(SessionPhase::Closed as u8, Ordering::Release);
        self.transport.lock().await.close().await;
    }

    /// Receives messages until the transport reports end-of-stream, handing
    /// each decoded `(event, payload)` to `dispatcher`.
    ///
    /// A malformed packet is logged and skipped; it never terminates the
    /// connection. A dispatch response is sent back within the same iteration,
    /// before the next receive.
    pub async fn run_loop(self: &Arc<Self>, dispatcher: &EventDispatcher) {
        loop {
            let received = self.transport.lock().await.recv().await;
            let raw = match received {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    debug!(client = %self.id, "connection closed by peer");
                    break;
                }
                Err(e) => {
                    warn!(client = %self.id, error = %e, "transport error, ending session");
                    break;
                }
            };

            let (event, payload) = match Self::parse_message(&raw) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(client = %self.id, raw = %raw, error = %e, "discarding malformed message");
                    continue;
                }
            };

            if let Some((out_event, response)) = dispatcher.dispatch(&event, payload, self).await {
                match self.send(&out_event, &response).await {
                    Ok(()) => {}
                    Err(DevioError::UnsendableValue) => {
                        warn!(
                            client = %self.id,
                            event = %out_event,
                            "handler returned a non-sendable response, dropping it"
                        );
                    }
                    Err(_) => break,
                }
            }
        }

        self.phase
            .store(SessionPhase::Closed as u8, Ordering::Release);
    }

    /// Parses a post-handshake packet into its `(event, payload)` pair.
    fn parse_message(raw: &str) -> Result<(String, Value), DevioError> {
        let fields = packet::decode(raw);
        let actual = fields.len();
        let [event, payload_raw] = <[String; 2]>::try_from(fields)
            .map_err(|_| DevioError::MalformedMessage { expected: 2, actual })?;
        Ok((event, value::from_wire(&payload_raw)))
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("phase", &self.phase())
            .finish()
    }
}

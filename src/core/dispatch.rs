// src/core/dispatch.rs

//! Routes incoming events to the handlers of one device type.

use crate::connection::ClientSession;
use crate::core::device::{DeviceType, EventPair};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// The two lifecycle event names. These are invoked directly by the registry
/// around the receive loop and are never dispatched from the wire.
const RESERVED_EVENTS: [&str; 2] = ["connect", "disconnect"];

/// Resolves incoming events against one `DeviceType` and isolates handler
/// failures from the transport loop.
pub struct EventDispatcher {
    device: Arc<dyn DeviceType>,
}

impl EventDispatcher {
    pub fn new(device: Arc<dyn DeviceType>) -> Self {
        Self { device }
    }

    /// Dispatches one `(event, payload)` message from `session`.
    ///
    /// Returns the handler's outgoing pair, or `None` when the event has no
    /// handler, names a reserved lifecycle event, or the handler failed. A
    /// handler error is logged with the client id and event name and never
    /// propagates; one misbehaving handler must not terminate the connection.
    pub async fn dispatch(
        &self,
        event: &str,
        payload: Value,
        session: &Arc<ClientSession>,
    ) -> Option<EventPair> {
        if RESERVED_EVENTS.contains(&event) {
            debug!(
                client = %session.id(),
                event,
                "ignoring reserved lifecycle event received on the wire"
            );
            return None;
        }

        let handler = self.device.events().get(event)?;

        match handler(payload, Arc::clone(session)).await {
            Ok(pair) => pair,
            Err(e) => {
                error!(
                    client = %session.id(),
                    event,
                    error = %e,
                    "event handler failed"
                );
                None
            }
        }
    }
}

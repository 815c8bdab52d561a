// src/server/registry.rs

//! The connection registry: the manager owning device types and live sessions.

use crate::connection::{ClientSession, Transport};
use crate::core::DevioError;
use crate::core::device::{DeviceType, LifecycleHandler};
use crate::core::dispatch::EventDispatcher;
use crate::server::guard::SessionGuard;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// The default bound on waiting for a client's handshake packet.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the set of registered device types and the set of live sessions, and
/// orchestrates connect, receive loop, and disconnect for each accepted
/// transport.
///
/// Both maps are touched from every connection's task; `DashMap` keeps
/// insert/remove safe under that interleaving. The generic lifecycle hooks are
/// installed through `&mut self` before the registry is shared behind an
/// `Arc`, which fixes their identity for the registry's lifetime.
pub struct ConnectionRegistry {
    types: DashMap<String, Arc<dyn DeviceType>>,
    pub(crate) sessions: DashMap<String, Arc<ClientSession>>,
    connect_hook: Option<LifecycleHandler>,
    disconnect_hook: Option<LifecycleHandler>,
    handshake_timeout: Duration,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
            sessions: DashMap::new(),
            connect_hook: None,
            disconnect_hook: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Registers a device type under its `type_name`, overwriting any previous
    /// registration for that name.
    pub fn register_type(&self, device: Arc<dyn DeviceType>) -> Result<(), DevioError> {
        if device.type_name().is_empty() {
            return Err(DevioError::InvalidDeviceType(
                "type_name must be a non-empty string".to_string(),
            ));
        }

        debug!(device_type = %device.type_name(), "registered device type");
        self.types.insert(device.type_name().to_string(), device);
        Ok(())
    }

    /// Installs the generic connect hook, run for every admitted session after
    /// its type-specific handler. Replaces the hook wholesale.
    pub fn on_connect<F, Fut>(&mut self, hook: F)
    where
        F: Fn(Arc<ClientSession>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.connect_hook = Some(Box::new(move |session| Box::pin(hook(session))));
    }

    /// Installs the generic disconnect hook. Replaces the hook wholesale.
    pub fn on_disconnect<F, Fut>(&mut self, hook: F)
    where
        F: Fn(Arc<ClientSession>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.disconnect_hook = Some(Box::new(move |session| Box::pin(hook(session))));
    }

    /// Looks up a live session by client id.
    pub fn session(&self, id: &str) -> Option<Arc<ClientSession>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// The number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The ids of all live sessions of the given type.
    pub fn sessions_of_type(&self, type_name: &str) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().type_name() == type_name)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Runs the full per-connection flow on a freshly upgraded transport:
    /// handshake, type validation, admission, lifecycle hooks, receive loop,
    /// and removal from the live set.
    ///
    /// Failures in individual lifecycle handlers are logged and isolated; only
    /// a failed handshake or an unregistered type refuse the connection, and
    /// only those two conditions are reported back to the caller. In both
    /// cases the transport is closed and the session never enters the live
    /// set.
    pub async fn accept(&self, transport: Box<dyn Transport>) -> Result<(), DevioError> {
        let session =
            Arc::new(ClientSession::handshake(transport, self.handshake_timeout).await?);

        let Some(device) = self
            .types
            .get(session.type_name())
            .map(|entry| Arc::clone(entry.value()))
        else {
            warn!(
                client = %session.id(),
                device_type = %session.type_name(),
                "client claimed an unknown device type, refusing connection"
            );
            session.close().await;
            return Err(DevioError::UnregisteredDeviceType(
                session.type_name().to_string(),
            ));
        };

        // A re-connect under an id that is still in the live set replaces the
        // stale entry; the old session's guard will not remove the new one.
        self.sessions
            .insert(session.id().to_string(), Arc::clone(&session));
        let _guard = SessionGuard::new(self, Arc::clone(&session));

        if let Err(e) = device.on_connect(&session).await {
            error!(client = %session.id(), error = %e, "type-specific connect handler failed");
        }
        if let Some(hook) = &self.connect_hook {
            if let Err(e) = hook(Arc::clone(&session)).await {
                error!(client = %session.id(), error = %e, "generic connect hook failed");
            }
        }

        let dispatcher = EventDispatcher::new(Arc::clone(&device));
        session.run_loop(&dispatcher).await;

        if let Err(e) = device.on_disconnect(&session).await {
            error!(client = %session.id(), error = %e, "type-specific disconnect handler failed");
        }
        if let Some(hook) = &self.disconnect_hook {
            if let Err(e) = hook(Arc::clone(&session)).await {
                error!(client = %session.id(), error = %e, "generic disconnect hook failed");
            }
        }

        // The guard removes the session from the live set on drop, even if a
        // handler above panicked.
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field(
                "types",
                &self
                    .types
                    .iter()
                    .map(|e| e.key().clone())
                    .collect::<Vec<_>>(),
            )
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

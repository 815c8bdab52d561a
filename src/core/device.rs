// src/core/device.rs

//! Device type definitions: a named bundle of event handlers.
//!
//! A `DeviceType` covers a fixed capability set: the two reserved lifecycle
//! events (`connect`, `disconnect`) plus an explicit table mapping event names
//! to application handlers. The table is built once at construction and is
//! read-only afterwards, so dispatch never races with handler registration.

use crate::connection::ClientSession;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// An outgoing `(event, message)` pair produced by a handler.
///
/// A handler may name any outgoing event; echoing the incoming event name is
/// just the common case, not a constraint.
pub type EventPair = (String, Value);

/// The boxed future returned by an event handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Option<EventPair>>> + Send>>;

/// An event handler: receives the decoded payload and the originating session,
/// returns `None` for "no response" or `Some((event, message))` to reply.
pub type EventHandler = Box<dyn Fn(Value, Arc<ClientSession>) -> HandlerFuture + Send + Sync>;

/// The boxed future returned by a lifecycle (connect/disconnect) handler.
pub type LifecycleFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A connect or disconnect handler.
pub type LifecycleHandler = Box<dyn Fn(Arc<ClientSession>) -> LifecycleFuture + Send + Sync>;

/// An explicit mapping from event name to handler.
///
/// Absence of an entry for a given event is not an error; dispatch treats it
/// as a no-op. The reserved lifecycle names never live in this table.
#[derive(Default)]
pub struct EventTable {
    handlers: HashMap<String, EventHandler>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a handler to an event name, replacing any previous binding.
    pub fn on<F, Fut>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, Arc<ClientSession>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<EventPair>>> + Send + 'static,
    {
        self.handlers.insert(
            event.into(),
            Box::new(move |payload, session| Box::pin(handler(payload, session))),
        );
        self
    }

    /// Looks up the handler bound to `event`, if any.
    pub fn get(&self, event: &str) -> Option<&EventHandler> {
        self.handlers.get(event)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }
}

impl std::fmt::Debug for EventTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTable")
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One class of device, identified by its unique `type_name`.
///
/// Implementations live for the process lifetime and are never mutated after
/// registration. The lifecycle methods default to no-ops; an error returned
/// from any of them is logged at the call site and never aborts a connection.
#[async_trait]
pub trait DeviceType: Send + Sync {
    /// The unique key under which this type is registered.
    fn type_name(&self) -> &str;

    /// The application event handlers for this type.
    fn events(&self) -> &EventTable;

    /// Invoked after a session of this type is admitted into the live set.
    async fn on_connect(&self, _session: &Arc<ClientSession>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Invoked after the session's receive loop has exited.
    async fn on_disconnect(&self, _session: &Arc<ClientSession>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A ready-made `DeviceType` built from closures, for applications that do not
/// need a dedicated struct per device class.
pub struct StaticDevice {
    name: String,
    events: EventTable,
    connect: Option<LifecycleHandler>,
    disconnect: Option<LifecycleHandler>,
}

impl StaticDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: EventTable::new(),
            connect: None,
            disconnect: None,
        }
    }

    /// Binds an application event handler.
    pub fn on<F, Fut>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, Arc<ClientSession>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<EventPair>>> + Send + 'static,
    {
        self.events = self.events.on(event, handler);
        self
    }

    /// Installs the connect handler for this type.
    pub fn on_connect<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<ClientSession>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.connect = Some(Box::new(move |session| Box::pin(handler(session))));
        self
    }

    /// Installs the disconnect handler for this type.
    pub fn on_disconnect<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Arc<ClientSession>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.disconnect = Some(Box::new(move |session| Box::pin(handler(session))));
        self
    }
}

#[async_trait]
impl DeviceType for StaticDevice {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> &EventTable {
        &self.events
    }

    async fn on_connect(&self, session: &Arc<ClientSession>) -> anyhow::Result<()> {
        match &self.connect {
            Some(handler) => handler(Arc::clone(session)).await,
            None => Ok(()),
        }
    }

    async fn on_disconnect(&self, session: &Arc<ClientSession>) -> anyhow::Result<()> {
        match &self.disconnect {
            Some(handler) => handler(Arc::clone(session)).await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for StaticDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticDevice")
            .field("name", &self.name)
            .field("events", &self.events)
            .field("has_connect", &self.connect.is_some())
            .field("has_disconnect", &self.disconnect.is_some())
            .finish()
    }
}

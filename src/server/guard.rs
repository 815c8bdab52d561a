// src/server/guard.rs

//! An RAII guard that deregisters a session from the live set.

use crate::connection::ClientSession;
use crate::server::registry::ConnectionRegistry;
use std::sync::Arc;
use tracing::debug;

/// Removes its session from the registry's live set when dropped, so the
/// entry cannot leak even if a lifecycle handler panics mid-flow.
pub(crate) struct SessionGuard<'a> {
    registry: &'a ConnectionRegistry,
    session: Arc<ClientSession>,
}

impl<'a> SessionGuard<'a> {
    pub(crate) fn new(registry: &'a ConnectionRegistry, session: Arc<ClientSession>) -> Self {
        Self { registry, session }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // Only remove the exact session this guard was created for; a newer
        // connection may have replaced the entry under the same id.
        let removed = self
            .registry
            .sessions
            .remove_if(self.session.id(), |_, live| {
                Arc::ptr_eq(live, &self.session)
            });

        if removed.is_some() {
            debug!(client = %self.session.id(), "session removed from live set");
        }
    }
}

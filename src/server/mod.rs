// src/server/mod.rs

//! The hosting side of the gateway: listener, registry, and session cleanup.

use crate::config::Config;
use anyhow::Result;
use std::sync::Arc;

mod guard;
mod listener;
mod registry;

pub use registry::{ConnectionRegistry, DEFAULT_HANDSHAKE_TIMEOUT};

/// Runs the gateway with the given configuration and a fully wired registry.
/// Returns once a shutdown signal has been handled.
pub async fn run(config: Config, registry: Arc<ConnectionRegistry>) -> Result<()> {
    listener::run(registry, &config).await
}

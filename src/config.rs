// src/config.rs

//! Manages gateway configuration: loading from TOML and field defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// The gateway's runtime configuration, loaded once at startup.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Address the listener binds to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port the listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long a fresh connection may take to send its handshake packet.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Refuse new connections once this many sessions are live. `0` disables the limit.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Default log filter, overridable with `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7373
}

fn default_handshake_timeout_secs() -> u64 {
    30
}

fn default_max_clients() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            max_clients: default_max_clients(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads and parses the configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        Ok(config)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

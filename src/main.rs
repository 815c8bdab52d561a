// src/main.rs

//! The main entry point for the devio gateway binary.
//!
//! Runs the gateway with a single `echo` device type wired in, the smallest
//! useful deployment. Library users build their own registry and call
//! `server::run` themselves.

use anyhow::Result;
use devio::config::Config;
use devio::{ConnectionRegistry, StaticDevice, server};
use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("devio version {VERSION}");
        return Ok(());
    }

    // The configuration path can be provided via a --config flag; otherwise
    // it defaults to "config.toml".
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("config.toml");

    let mut config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    // Override port if provided as a command-line argument.
    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        if let Some(port_str) = args.get(port_index + 1) {
            match port_str.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => {
                    eprintln!("Invalid port number: {port_str}");
                    std::process::exit(1);
                }
            }
        } else {
            eprintln!("--port flag requires a value");
            std::process::exit(1);
        }
    }

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    info!("Starting devio gateway v{VERSION}...");

    let mut registry = ConnectionRegistry::new().with_handshake_timeout(config.handshake_timeout());

    registry.register_type(Arc::new(
        StaticDevice::new("echo")
            .on_connect(|session| async move {
                info!(client = %session.id(), "echo client connected");
                Ok(())
            })
            .on("echo", |payload, session| async move {
                info!(client = %session.id(), ?payload, "echo request");
                Ok(Some(("echo_response".to_string(), payload)))
            })
            .on_disconnect(|session| async move {
                info!(client = %session.id(), "echo client disconnected");
                Ok(())
            }),
    ))?;

    registry.on_connect(|session| async move {
        info!(client = %session.id(), device_type = %session.type_name(), "client connected");
        Ok(())
    });
    registry.on_disconnect(|session| async move {
        info!(client = %session.id(), "client disconnected");
        Ok(())
    });

    if let Err(e) = server::run(config, Arc::new(registry)).await {
        error!("Gateway runtime error: {e}");
        return Err(e);
    }

    Ok(())
}

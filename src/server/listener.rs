// src/server/listener.rs

//! Contains the main server loop for accepting connections and handling
//! graceful shutdown.

use crate::config::Config;
use crate::connection::WsTransport;
use crate::server::registry::ConnectionRegistry;
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Binds the listener and accepts connections until SIGINT/SIGTERM, spawning
/// one task per connection. Each task runs `ConnectionRegistry::accept`
/// end-to-end for its transport.
pub async fn run(registry: Arc<ConnectionRegistry>, config: &Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind listener on {addr}"))?;
    info!("devio gateway listening on {addr}");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut client_tasks = JoinSet::new();

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }

            res = listener.accept() => {
                match res {
                    Ok((socket, peer)) => {
                        if config.max_clients > 0 && registry.session_count() >= config.max_clients {
                            warn!(%peer, "connection refused: max_clients reached");
                            continue;
                        }
                        debug!(%peer, "accepted new connection");

                        let registry = Arc::clone(&registry);
                        let mut shutdown_rx = shutdown_tx.subscribe();
                        client_tasks.spawn(async move {
                            tokio::select! {
                                biased;
                                _ = shutdown_rx.recv() => {
                                    debug!(%peer, "connection task stopped by shutdown signal");
                                }
                                _ = serve(socket, peer, registry) => {}
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {e}"),
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!("A client handler panicked: {e:?}");
                    }
                }
            },
        }
    }

    let _ = shutdown_tx.send(());
    client_tasks.shutdown().await;
    info!("All client connections closed.");
    Ok(())
}

/// Upgrades one accepted socket to a WebSocket and hands it to the registry.
async fn serve(socket: TcpStream, peer: SocketAddr, registry: Arc<ConnectionRegistry>) {
    match tokio_tungstenite::accept_async(socket).await {
        Ok(ws) => {
            if let Err(e) = registry.accept(Box::new(WsTransport::new(ws))).await {
                debug!(%peer, error = %e, "connection refused");
            }
        }
        Err(e) => warn!(%peer, error = %e, "websocket upgrade failed"),
    }
}

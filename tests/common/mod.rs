// tests/common/mod.rs

//! Shared test utilities: an in-memory transport backed by channels.

#![allow(dead_code)]

use async_trait::async_trait;
use devio::{DevioError, Transport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Polls `cond` until it holds, panicking after a couple of seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// A message-oriented `Transport` running over a pair of in-process channels,
/// standing in for a real socket in tests.
pub struct MockTransport {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

/// The client half of a `MockTransport` pair.
pub struct MockPeer {
    tx: Option<mpsc::UnboundedSender<String>>,
    pub rx: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Builds a connected transport/peer pair.
    pub fn pair() -> (MockTransport, MockPeer) {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        (
            MockTransport {
                rx: server_rx,
                tx: server_tx,
                closed: Arc::clone(&closed),
            },
            MockPeer {
                tx: Some(client_tx),
                rx: client_rx,
                closed,
            },
        )
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv(&mut self) -> Result<Option<String>, DevioError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(raw) => Ok(Some(raw)),
            None => {
                self.closed.store(true, Ordering::SeqCst);
                Ok(None)
            }
        }
    }

    async fn send(&mut self, raw: &str) -> Result<(), DevioError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DevioError::ConnectionEnded);
        }
        if self.tx.send(raw.to_string()).is_err() {
            self.closed.store(true, Ordering::SeqCst);
            return Err(DevioError::ConnectionEnded);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.rx.close();
    }
}

impl MockPeer {
    /// True once the server side has closed the transport.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends one raw message to the server side.
    pub fn send_raw(&self, raw: &str) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(raw.to_string());
        }
    }

    /// Simulates the client going away: the server's next receive sees
    /// end-of-stream once the in-flight messages are drained.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }
}

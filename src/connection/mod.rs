// src/connection/mod.rs

//! Manages a single client connection: the transport it runs on and the
//! session state layered on top of it.

mod session;
mod transport;

pub use session::{ClientSession, SessionPhase};
pub use transport::{Transport, WsTransport};

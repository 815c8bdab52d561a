// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;
pub mod server;

// Re-export
pub use crate::connection::{ClientSession, SessionPhase, Transport, WsTransport};
pub use crate::core::DevioError;
pub use crate::core::device::{DeviceType, EventPair, EventTable, StaticDevice};
pub use crate::core::dispatch::EventDispatcher;
pub use crate::server::ConnectionRegistry;

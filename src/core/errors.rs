// src/core/errors.rs

//! Defines the primary error type for the entire application.

use thiserror::Error;

/// The main error enum, representing all possible failures within the gateway.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug)]
pub enum DevioError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// The client never produced a usable handshake packet. The transport has
    /// already been closed by the time this is returned.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// The handshake succeeded but the declared type has no registered `DeviceType`.
    #[error("No device type registered under '{0}'")]
    UnregisteredDeviceType(String),

    /// A post-handshake packet did not decode to the expected field count.
    #[error("Malformed message: expected {expected} fields, got {actual}")]
    MalformedMessage { expected: usize, actual: usize },

    /// A send was attempted on a session whose transport is already closed.
    #[error("Connection ended")]
    ConnectionEnded,

    /// A value of a kind outside the sendable set (bool, integer, float,
    /// string, string-keyed mapping) was passed to `send`.
    #[error("A non-sendable value was passed to a client's send method")]
    UnsendableValue,

    #[error("Invalid device type: {0}")]
    InvalidDeviceType(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for DevioError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        DevioError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for DevioError {
    fn from(err: serde_json::Error) -> Self {
        DevioError::Serialization(err.to_string())
    }
}

// src/core/mod.rs

//! The core of the gateway: wire protocol, device types, and event dispatch.

pub mod device;
pub mod dispatch;
pub mod errors;
pub mod protocol;

pub use errors::DevioError;

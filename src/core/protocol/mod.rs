// src/core/protocol/mod.rs

//! The wire protocol: packet framing and payload value conversion.

pub mod packet;
pub mod value;

pub use packet::{decode, encode};
pub use value::{from_wire, to_wire};

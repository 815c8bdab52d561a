// src/core/protocol/value.rs

//! Conversion between message payloads and their wire representation.
//!
//! Outgoing values are restricted to the sendable set: booleans, integers,
//! floats, strings, and string-keyed mappings. Scalars are written in their
//! canonical string form, mappings as compact JSON, and everything else
//! (arrays, null) is rejected before any I/O happens.
//!
//! Incoming payloads take the reverse, lenient path: if the raw field parses
//! as JSON it becomes the parsed document, otherwise the raw string is kept
//! unchanged. Callers must not assume one or the other.

use crate::core::DevioError;
use serde_json::Value;

/// Converts a sendable value into its wire string.
///
/// Note that a plain string is sent as-is, without JSON quoting, matching the
/// scalar-to-string policy of the protocol.
pub fn to_wire(value: &Value) -> Result<String, DevioError> {
    match value {
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Object(_) => Ok(serde_json::to_string(value)?),
        Value::Array(_) | Value::Null => Err(DevioError::UnsendableValue),
    }
}

/// Interprets a raw incoming field as a payload value.
pub fn from_wire(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

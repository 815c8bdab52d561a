// src/core/protocol/packet.rs

//! Implements the bracket-delimited packet format used on the wire.
//!
//! A packet is an ordered sequence of string fields, each framed as
//! `[/"<field>"/]` and concatenated with no separator. The handshake packet
//! `("c1", "echo", "{}")` is therefore sent as:
//!
//! ```text
//! [/"c1"/][/"echo"/][/"{}"/]
//! ```
//!
//! Field contents must not contain the literal `[` or `]` framing characters;
//! there is no escaping mechanism. Both sides of the connection depend on this
//! exact framing, so it is not negotiable.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches one framed field. The character class excludes the bracket
/// characters so a field can never scan past its own closing frame.
static FIELD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[/"([^\[\]]*)"/\]"#).expect("field pattern must compile"));

/// Encodes an ordered sequence of string fields into one wire message.
pub fn encode<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for field in fields {
        out.push_str("[/\"");
        out.push_str(field.as_ref());
        out.push_str("\"/]");
    }
    out
}

/// Extracts all framed fields from a raw wire message, in order.
///
/// A message with zero matches yields an empty vec, not an error; it is the
/// caller's job to enforce field counts.
pub fn decode(raw: &str) -> Vec<String> {
    FIELD_PATTERN
        .captures_iter(raw)
        .map(|caps| caps[1].to_string())
        .collect()
}

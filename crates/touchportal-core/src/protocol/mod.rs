//! Touch Portal wire protocol: framing, inbound records, outbound commands.
//!
//! Wire format: UTF-8 JSON objects separated by CRLF, CR or LF.  Every
//! object carries a string `type` field.

pub mod classify;
pub mod commands;
pub mod events;
pub mod framer;
pub mod messages;

/// Loopback address the host listens on.
pub const HOST_IP: &str = "127.0.0.1";

/// Well-known TCP port of the host's plugin API.
pub const HOST_PORT: u16 = 12136;

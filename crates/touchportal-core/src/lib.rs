//! # touchportal-core
//!
//! Shared library for Touch Portal plugins containing the line framer, the
//! inbound message classifier, and the outbound command shapes.
//!
//! It has zero dependencies on sockets or async runtimes.  Everything here is
//! a pure function of its input, so the protocol rules can be tested without
//! a running host.
//!
//! # How a plugin talks to Touch Portal
//!
//! The plugin opens a TCP connection to the host on the loopback interface
//! and both sides exchange one JSON object per line:
//!
//! ```text
//! plugin → host:  {"type":"pair","id":"my.plugin"}
//! host → plugin:  {"type":"info","settings":{...}}
//! host → plugin:  {"type":"action","actionId":"my.plugin.act", ...}
//! ```
//!
//! - **`protocol::framer`** – Splits the raw byte stream into lines and
//!   decodes each line into a [`MessageRecord`].
//! - **`protocol::classify`** – Maps a record's `type` to the typed
//!   [`PluginEvent`]s a consumer sees.
//! - **`protocol::commands`** – Outbound message shapes and the preconditions
//!   checked before anything is written.
//! - **`registry`** – Bookkeeping for locally created custom states.

pub mod protocol;
pub mod registry;

pub use protocol::classify::{classify, Classified, EventCategory};
pub use protocol::commands::{encode_batch, encode_line, CommandError, OutboundMessage, StateValue};
pub use protocol::events::{EventKind, Hold, PluginEvent};
pub use protocol::framer::{decode_record, FrameError, LineFramer, RecordFramer};
pub use protocol::messages::MessageRecord;
pub use registry::{CustomStateRegistry, StateRegistration};

//! Application layer for touchportal-plugin.
//!
//! Knows *what* happens to events and commands but not *how* bytes move:
//!
//! - [`Dispatcher`] delivers typed events to plugin callbacks in order.
//! - [`CommandSender`] validates and encodes outbound commands and queues
//!   them for the session task.
//!
//! Sockets, timers and HTTP live in the infrastructure layer.

pub mod commands;
pub mod dispatcher;

pub use commands::{CommandSender, SendError};
pub use dispatcher::{Dispatcher, EventHandler, SubscriptionId};

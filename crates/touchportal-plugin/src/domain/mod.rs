//! Domain layer for touchportal-plugin.
//!
//! Pure types with no I/O: the session configuration and the lifecycle state
//! machine.  No `tokio`, no sockets, no file access.

pub mod config;
pub mod state;

pub use config::{ConfigError, PluginConfig};
pub use state::{InvalidTransition, LifecycleEvent, SessionState};

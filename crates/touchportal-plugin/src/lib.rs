//! touchportal-plugin library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does a Touch Portal plugin do?
//!
//! Touch Portal turns a phone or tablet into a control surface.  A plugin is
//! a separate process that adds actions and states to it:
//!
//! 1. It connects to Touch Portal on `127.0.0.1:12136` and pairs by sending
//!    its plugin id.
//! 2. Touch Portal answers with `info` (and the user's settings), then sends
//!    `action`, `down`, `up`, `listChange` and `broadcast` messages as the
//!    user presses buttons and switches pages.
//! 3. The plugin pushes state values and choice lists back so buttons can
//!    show live data.
//! 4. When Touch Portal shuts the plugin down it sends `closePlugin`.
//!
//! The protocol rules live in `touchportal_core`; this crate adds the socket,
//! the event subscriptions and the command handle.

/// Domain layer: configuration and lifecycle state.
pub mod domain;

/// Application layer: event dispatch and the command handle.
pub mod application;

/// Infrastructure layer: socket session, update check, config file.
pub mod infrastructure;

pub use application::{CommandSender, Dispatcher, SendError, SubscriptionId};
pub use domain::{ConfigError, PluginConfig, SessionState};
pub use infrastructure::{Session, SessionError, SessionExit};

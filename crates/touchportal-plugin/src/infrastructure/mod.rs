//! Infrastructure layer for touchportal-plugin.
//!
//! Everything that touches the outside world:
//!
//! - **`session`** – TCP connection to the host, the pairing handshake and
//!   the single task that reads, writes and dispatches.
//! - **`update_check`** – HTTP request for the latest published version.
//! - **`config_file`** – Optional TOML file read by the binary.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `touchportal_core`, but nothing below it may depend on this layer.

pub mod config_file;
pub mod session;
pub mod update_check;

pub use config_file::{ConfigFile, ConfigFileError};
pub use session::{Session, SessionError, SessionExit};
pub use update_check::{check_for_update, HttpVersionSource, UpdateCheckError, VersionSource};

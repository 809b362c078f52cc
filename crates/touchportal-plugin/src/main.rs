//! Touch Portal plugin client: entry point.
//!
//! Connects to a running Touch Portal, pairs under the given plugin id and
//! logs every event the host sends until Touch Portal closes the plugin or
//! the user presses Ctrl+C.  Useful on its own for watching the protocol, and
//! as the skeleton for a real plugin binary.
//!
//! # Usage
//!
//! ```text
//! touchportal-plugin [OPTIONS]
//!
//! Options:
//!   --plugin-id <ID>          Plugin id to pair as
//!   --config <PATH>           TOML config file
//!   --host <IP>               Touch Portal address [default: 127.0.0.1]
//!   --port <PORT>             Touch Portal plugin port [default: 12136]
//!   --connect-timeout <SECS>  Connect timeout, 0 to wait forever [default: 10]
//!   --update-url <URL>        Endpoint returning {"version": "x.y.z"}
//!   --plugin-version <VER>    Version compared against the update endpoint
//! ```
//!
//! # Precedence
//!
//! CLI flags (or their environment variables) beat the config file, which
//! beats the built-in defaults.
//!
//! | Variable             | Flag                |
//! |----------------------|---------------------|
//! | `TP_PLUGIN_ID`       | `--plugin-id`       |
//! | `TP_CONFIG`          | `--config`          |
//! | `TP_HOST`            | `--host`            |
//! | `TP_PORT`            | `--port`            |
//! | `TP_CONNECT_TIMEOUT` | `--connect-timeout` |
//! | `TP_UPDATE_URL`      | `--update-url`      |
//! | `TP_PLUGIN_VERSION`  | `--plugin-version`  |
//!
//! The log level is controlled by `RUST_LOG` (default `info`).
//!
//! # Exit status
//!
//! `0` when the host closes the plugin or on Ctrl+C, non-zero when the
//! configuration is invalid or the connection fails.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use touchportal_core::PluginEvent;
use touchportal_plugin::domain::PluginConfig;
use touchportal_plugin::infrastructure::{ConfigFile, Session, SessionExit};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Touch Portal plugin client.
///
/// Every option is optional here so that values missing on the command line
/// can come from the config file.
#[derive(Debug, Parser)]
#[command(
    name = "touchportal-plugin",
    about = "Connects to Touch Portal as a plugin and logs its events",
    version
)]
struct Cli {
    /// Plugin id to pair as.  Required here or in the config file.
    #[arg(long, env = "TP_PLUGIN_ID")]
    plugin_id: Option<String>,

    /// TOML config file with `[plugin]`, `[connection]` and `[update]` tables.
    #[arg(long, env = "TP_CONFIG")]
    config: Option<PathBuf>,

    /// IP address of Touch Portal.
    #[arg(long, env = "TP_HOST")]
    host: Option<String>,

    /// Touch Portal's plugin port.
    #[arg(long, env = "TP_PORT")]
    port: Option<u16>,

    /// Connect timeout in seconds; `0` waits forever.
    #[arg(long, env = "TP_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// Endpoint returning `{"version": "x.y.z"}`.  No update check without it.
    #[arg(long, env = "TP_UPDATE_URL")]
    update_url: Option<String>,

    /// Version compared against the update endpoint.
    #[arg(long, env = "TP_PLUGIN_VERSION")]
    plugin_version: Option<String>,
}

impl Cli {
    /// Loads the config file (if any), applies the CLI overrides and builds a
    /// validated [`PluginConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the merged values are invalid.
    fn into_plugin_config(self) -> anyhow::Result<PluginConfig> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => ConfigFile::default(),
        };
        self.apply_to(file)
            .into_plugin_config()
            .context("invalid plugin configuration")
    }

    /// Overwrites every file value that was also given on the command line.
    fn apply_to(self, mut file: ConfigFile) -> ConfigFile {
        if self.plugin_id.is_some() {
            file.plugin.id = self.plugin_id;
        }
        if self.plugin_version.is_some() {
            file.plugin.version = self.plugin_version;
        }
        if self.host.is_some() {
            file.connection.host = self.host;
        }
        if self.port.is_some() {
            file.connection.port = self.port;
        }
        if self.connect_timeout.is_some() {
            file.connection.connect_timeout_secs = self.connect_timeout;
        }
        if self.update_url.is_some() {
            file.update.url = self.update_url;
        }
        file
    }
}

/// One log line per event.
fn log_event(event: &PluginEvent) {
    match event {
        PluginEvent::Connected => info!("paired with Touch Portal"),
        PluginEvent::Settings(values) => info!(event = %event.kind(), "{values}"),
        PluginEvent::Update { current, latest } => {
            info!(event = %event.kind(), "new version {latest} available (running {current})")
        }
        PluginEvent::Action { record, hold } => info!(
            event = %event.kind(),
            hold = ?hold,
            action_id = record.get_str("actionId").unwrap_or_default(),
            "action"
        ),
        _ => {
            if let Some(record) = event.record() {
                info!(event = %event.kind(), "{}", serde_json::Value::Object(record.fields().clone()));
            }
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_plugin_config()?;

    info!(
        "touchportal-plugin starting: id={}, host={}",
        config.plugin_id, config.host_addr
    );

    let mut session = Session::new(config).context("invalid plugin configuration")?;
    session.on_any(log_event);

    let commands = session.commands();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                // The session may already have ended.
                let _ = commands.shutdown();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let exit = session.run().await.context("plugin session failed")?;
    match exit {
        SessionExit::ClosedByHost => info!("Touch Portal closed the plugin"),
        SessionExit::Shutdown => info!("plugin shut down"),
        SessionExit::Detached => info!("connection ended"),
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

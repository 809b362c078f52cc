//! Plugin session configuration.
//!
//! [`PluginConfig`] is the single source of truth for how a session connects
//! and whether it checks for updates.  It is a plain struct: the binary fills
//! it from CLI flags and an optional TOML file (see
//! `infrastructure::config_file`), library users build it in code.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use touchportal_core::protocol::HOST_PORT;

/// Default time allowed for the TCP connect to the host.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for the whole update-check request.
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The plugin id is required for pairing.
    #[error("plugin id must not be empty")]
    EmptyPluginId,

    /// The host address could not be parsed.
    #[error("invalid host address: {0}")]
    InvalidAddress(String),

    /// A timeout of zero would fail every attempt immediately.
    #[error("{0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Everything a [`crate::infrastructure::session::Session`] needs to run.
///
/// # Example
///
/// ```rust
/// use touchportal_plugin::domain::PluginConfig;
///
/// let cfg = PluginConfig::new("demo.plugin")
///     .with_update_url("https://example.com/version.json");
/// assert_eq!(cfg.host_addr.port(), 12136);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    /// Identity sent in the pair message and matched against `closePlugin`.
    pub plugin_id: String,

    /// Address of the host's plugin API.  Always loopback in production;
    /// tests point it at an ephemeral listener.
    pub host_addr: SocketAddr,

    /// Endpoint returning `{"version": "x.y.z"}`.  `None` disables the
    /// update check.
    pub update_url: Option<String>,

    /// Version of the plugin using this library, compared against the
    /// update endpoint's answer.
    pub plugin_version: String,

    /// Upper bound on the TCP connect.  `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,

    /// Upper bound on the update-check request.
    pub update_timeout: Duration,
}

impl PluginConfig {
    /// Builds a config for `plugin_id` with defaults for everything else.
    ///
    /// | Field           | Default              |
    /// |-----------------|----------------------|
    /// | host_addr       | `127.0.0.1:12136`    |
    /// | update_url      | none                 |
    /// | plugin_version  | this crate's version |
    /// | connect_timeout | 10 seconds           |
    /// | update_timeout  | 30 seconds           |
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            host_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), HOST_PORT),
            update_url: None,
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            update_timeout: DEFAULT_UPDATE_TIMEOUT,
        }
    }

    pub fn with_host_addr(mut self, host_addr: SocketAddr) -> Self {
        self.host_addr = host_addr;
        self
    }

    pub fn with_update_url(mut self, url: impl Into<String>) -> Self {
        self.update_url = Some(url.into());
        self
    }

    pub fn with_plugin_version(mut self, version: impl Into<String>) -> Self {
        self.plugin_version = version.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_update_timeout(mut self, timeout: Duration) -> Self {
        self.update_timeout = timeout;
        self
    }

    /// Checks the values a session cannot work without.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyPluginId`] if `plugin_id` is empty.
    /// - [`ConfigError::ZeroTimeout`] if a configured timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plugin_id.trim().is_empty() {
            return Err(ConfigError::EmptyPluginId);
        }
        if self.connect_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout("connect"));
        }
        if self.update_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("update"));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_host_is_loopback_12136() {
        // Arrange / Act
        let cfg = PluginConfig::new("demo");
        // Assert
        assert_eq!(cfg.host_addr.to_string(), "127.0.0.1:12136");
    }

    #[test]
    fn test_update_check_disabled_by_default() {
        let cfg = PluginConfig::new("demo");
        assert_eq!(cfg.update_url, None);
    }

    #[test]
    fn test_default_timeouts() {
        let cfg = PluginConfig::new("demo");
        assert_eq!(cfg.connect_timeout, Some(Duration::from_secs(10)));
        assert_eq!(cfg.update_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_methods_override_defaults() {
        let cfg = PluginConfig::new("demo")
            .with_host_addr("127.0.0.1:9000".parse().unwrap())
            .with_update_url("https://example.com/v.json")
            .with_plugin_version("2.0.0")
            .with_connect_timeout(None)
            .with_update_timeout(Duration::from_secs(3));

        assert_eq!(cfg.host_addr.port(), 9000);
        assert_eq!(cfg.update_url.as_deref(), Some("https://example.com/v.json"));
        assert_eq!(cfg.plugin_version, "2.0.0");
        assert_eq!(cfg.connect_timeout, None);
        assert_eq!(cfg.update_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_validate_rejects_empty_plugin_id() {
        assert_eq!(
            PluginConfig::new("  ").validate(),
            Err(ConfigError::EmptyPluginId)
        );
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let cfg = PluginConfig::new("demo").with_connect_timeout(Some(Duration::ZERO));
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTimeout("connect")));

        let cfg = PluginConfig::new("demo").with_update_timeout(Duration::ZERO);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTimeout("update")));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(PluginConfig::new("demo").validate().is_ok());
    }
}

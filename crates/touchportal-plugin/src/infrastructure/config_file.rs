//! TOML configuration file for the plugin binary.
//!
//! Every field is optional.  Values found here sit between the built-in
//! defaults and the command line: CLI flags win over the file, the file wins
//! over [`PluginConfig::new`]'s defaults.
//!
//! ```toml
//! [plugin]
//! id = "com.example.demo"
//! version = "1.2.0"
//!
//! [connection]
//! host = "127.0.0.1"
//! port = 12136
//! connect_timeout_secs = 10
//!
//! [update]
//! url = "https://example.com/demo/version.json"
//! timeout_secs = 30
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use touchportal_core::protocol::{HOST_IP, HOST_PORT};

use crate::domain::{ConfigError, PluginConfig};

/// Errors loading or applying the config file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The merged values are not a usable configuration.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// On-disk configuration schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub plugin: PluginSection,
    pub connection: ConnectionSection,
    pub update: UpdateSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PluginSection {
    pub id: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// `0` disables the timeout.
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateSection {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Parses TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Builds a validated [`PluginConfig`] from the file's values, falling
    /// back to the defaults for anything not set.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyPluginId`] if no plugin id is set.
    /// - [`ConfigError::InvalidAddress`] if `host` is not an IP address.
    pub fn into_plugin_config(self) -> Result<PluginConfig, ConfigFileError> {
        let host = self.connection.host.as_deref().unwrap_or(HOST_IP);
        let ip: IpAddr = host
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(host.to_string()))?;
        let port = self.connection.port.unwrap_or(HOST_PORT);

        let mut config = PluginConfig::new(self.plugin.id.unwrap_or_default())
            .with_host_addr(SocketAddr::new(ip, port));

        if let Some(version) = self.plugin.version {
            config = config.with_plugin_version(version);
        }
        if let Some(secs) = self.connection.connect_timeout_secs {
            config = config.with_connect_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if let Some(url) = self.update.url.filter(|url| !url.trim().is_empty()) {
            config = config.with_update_url(url);
        }
        if let Some(secs) = self.update.timeout_secs {
            config = config.with_update_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! It is built from CLI arguments, from a TOML file ([`RelayConfigFile`]), or
//! from the defaults, which match a Bela board attached over Ethernet-over-USB.
//!
//! ```toml
//! local_address  = "192.168.7.1"
//! local_port     = 7563
//! remote_address = "bela.local"
//! remote_port    = 7562
//! ws_bind        = "0.0.0.0"
//! ws_port        = 8080
//! client_queue   = 256
//! ```
//!
//! Every key in the file is optional.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for loading relay configuration from a file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The per-client queue must hold at least one frame.
    #[error("client_queue must be at least 1")]
    ZeroClientQueue,
}

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use osc_web_bridge::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 8080);
/// assert_eq!(cfg.device_host, "bela.local");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Local address the UDP socket binds to; the device sends here.
    pub udp_bind_addr: SocketAddr,

    /// Host name or IP of the OSC device.  Resolved once at startup.
    pub device_host: String,

    /// UDP port the device listens on.
    pub device_port: u16,

    /// Address the WebSocket listener binds to.
    pub ws_bind_addr: SocketAddr,

    /// Frames buffered per WebSocket client before further frames for that
    /// client are dropped.
    pub client_queue: usize,
}

impl Default for RelayConfig {
    /// | Field          | Default            |
    /// |----------------|--------------------|
    /// | udp_bind_addr  | `192.168.7.1:7563` |
    /// | device_host    | `bela.local`       |
    /// | device_port    | `7562`             |
    /// | ws_bind_addr   | `0.0.0.0:8080`     |
    /// | client_queue   | `256`              |
    fn default() -> Self {
        Self {
            udp_bind_addr: SocketAddr::new(default_local_address(), default_local_port()),
            device_host: default_remote_address(),
            device_port: default_remote_port(),
            ws_bind_addr: SocketAddr::new(default_ws_bind(), default_ws_port()),
            client_queue: default_client_queue(),
        }
    }
}

impl RelayConfig {
    /// Parses a TOML document into a config, filling absent keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or wrongly typed
    /// values, and [`ConfigError::ZeroClientQueue`] for `client_queue = 0`.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: RelayConfigFile = toml::from_str(content)?;
        file.try_into()
    }

    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, plus every
    /// error [`RelayConfig::from_toml_str`] can return.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

// ── File schema ───────────────────────────────────────────────────────────────

/// On-disk form of [`RelayConfig`].  Field names follow the CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RelayConfigFile {
    #[serde(default = "default_local_address")]
    pub local_address: IpAddr,
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    #[serde(default = "default_remote_address")]
    pub remote_address: String,
    #[serde(default = "default_remote_port")]
    pub remote_port: u16,
    #[serde(default = "default_ws_bind")]
    pub ws_bind: IpAddr,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    #[serde(default = "default_client_queue")]
    pub client_queue: usize,
}

impl TryFrom<RelayConfigFile> for RelayConfig {
    type Error = ConfigError;

    fn try_from(file: RelayConfigFile) -> Result<Self, Self::Error> {
        if file.client_queue == 0 {
            return Err(ConfigError::ZeroClientQueue);
        }
        Ok(Self {
            udp_bind_addr: SocketAddr::new(file.local_address, file.local_port),
            device_host: file.remote_address,
            device_port: file.remote_port,
            ws_bind_addr: SocketAddr::new(file.ws_bind, file.ws_port),
            client_queue: file.client_queue,
        })
    }
}

// ── Serde default helpers ─────────────────────────────────────────────────────

fn default_local_address() -> IpAddr {
    IpAddr::from([192, 168, 7, 1])
}

fn default_local_port() -> u16 {
    7563
}

fn default_remote_address() -> String {
    "bela.local".to_string()
}

fn default_remote_port() -> u16 {
    7562
}

fn default_ws_bind() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_ws_port() -> u16 {
    8080
}

fn default_client_queue() -> usize {
    256
}

// ── Tests ─────────────────────────────────────────────────────────────────────

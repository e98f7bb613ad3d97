//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/stagelink/config.toml` by default. Every section is optional.
//!
//! ```toml
//! [server]
//! port = 13377
//! bind_address = "0.0.0.0"
//!
//! [connect]
//! host = "127.0.0.1"
//! port = 13377
//! timeout_secs = 5
//!
//! [[devices]]
//! id = "4711"
//! name = "Stage left"
//! on = false
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stagelink_core::{Device, DeviceTable};
use stagelink_protocol::DEFAULT_PORT;
use stagelink_server::ServerConfig;

use crate::error::{ClientError, ClientResult};

/// Configuration for the stagelink binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Settings for `stagelink serve`.
    pub server: ServerSettings,

    /// Settings for commands that connect to a server.
    pub connect: ConnectSettings,

    /// Devices known to the in-process device table.
    pub devices: Vec<DeviceSettings>,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Port used when the console starts the server without one.
    pub port: u16,

    /// Interface to listen on.
    pub bind_address: IpAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

/// Outgoing connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectSettings {
    /// Server host name or address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Connection and response timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::LOCALHOST.to_string(),
            port: DEFAULT_PORT,
            timeout_secs: 5,
        }
    }
}

impl ConnectSettings {
    /// `host:port` string for connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A device entry seeding the device table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Device identifier sent on the wire.
    pub id: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Initial state.
    #[serde(default)]
    pub on: bool,
}

impl ClientConfig {
    /// Loads configuration from the default path, or defaults if absent.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values the type system does not.
    pub fn validate(&self) -> ClientResult<()> {
        stagelink_server::parse_port(&self.server.port.to_string())?;
        if self.connect.port == 0 {
            return Err(ClientError::Config("connect.port must not be 0".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(ClientError::Config("device id must not be empty".into()));
            }
            if !seen.insert(device.id.as_str()) {
                return Err(ClientError::Config(format!(
                    "duplicate device id '{}'",
                    device.id
                )));
            }
        }
        Ok(())
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> ClientResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Server configuration derived from the `[server]` section.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.server.port).with_bind_address(self.server.bind_address)
    }

    /// Device table seeded from `[[devices]]`.
    pub fn device_table(&self) -> DeviceTable {
        DeviceTable::with_devices(self.devices.iter().map(|entry| {
            let device = Device::new(entry.id.as_str()).with_state(entry.on);
            match &entry.name {
                Some(name) => device.with_name(name.as_str()),
                None => device,
            }
        }))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stagelink")
    }
}

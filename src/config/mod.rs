// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static configuration: the device list, timeouts and command vocabulary.
//!
//! Configuration is loaded from YAML once, validated, and then handed to the
//! [`DeviceRegistry`](crate::registry::DeviceRegistry) as plain data. It is
//! never mutated afterwards.
//!
//! # Examples
//!
//! ```
//! use megad_lib::config::Settings;
//! use megad_lib::types::PortKind;
//!
//! let settings = Settings::from_yaml_str(r#"
//! devices:
//!   - ip: 192.168.1.14
//!     name: hall
//!     password: sec
//!     ports:
//!       0: { type: input, name: Door }
//!       7: { type: output }
//! "#)?;
//!
//! let device = &settings.devices[0];
//! assert_eq!(device.ports[&7].kind, PortKind::Output);
//! # Ok::<(), megad_lib::error::ConfigError>(())
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::CommandVocabulary;
use crate::error::ConfigError;
use crate::types::PortKind;

/// Default address the notification listener binds to.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:16030";

/// Factory password of `MegaD` controllers.
pub const DEFAULT_PASSWORD: &str = "sec";

/// Declared kind and optional name of one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Input or output.
    #[serde(rename = "type")]
    pub kind: PortKind,
    /// Friendly name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PortConfig {
    /// An unnamed input port.
    #[must_use]
    pub fn input() -> Self {
        Self {
            kind: PortKind::Input,
            name: None,
        }
    }

    /// An unnamed output port.
    #[must_use]
    pub fn output() -> Self {
        Self {
            kind: PortKind::Output,
            name: None,
        }
    }

    /// Sets a friendly name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Configuration of one controller.
///
/// # Examples
///
/// ```
/// use megad_lib::config::{DeviceConfig, PortConfig};
///
/// let config = DeviceConfig::new("192.168.1.14".parse().unwrap(), "hall")
///     .with_password("s3cret")
///     .with_port(0, PortConfig::input().with_name("Door"))
///     .with_port(7, PortConfig::output());
///
/// assert_eq!(config.ports.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Address the device connects from and is polled at.
    pub ip: IpAddr,
    /// Friendly name.
    pub name: String,
    /// Password embedded in every outbound URL.
    #[serde(default = "default_password")]
    pub password: String,
    /// Optional numeric identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// HTTP port the device serves commands on.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Declared ports, keyed by index.
    #[serde(default)]
    pub ports: BTreeMap<u16, PortConfig>,
}

impl DeviceConfig {
    /// Creates a configuration with the factory password and no ports.
    #[must_use]
    pub fn new(ip: IpAddr, name: impl Into<String>) -> Self {
        Self {
            ip,
            name: name.into(),
            password: default_password(),
            id: None,
            http_port: default_http_port(),
            ports: BTreeMap::new(),
        }
    }

    /// Sets the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Sets the numeric identifier.
    #[must_use]
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the HTTP port used for outbound commands.
    #[must_use]
    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    /// Declares a port.
    #[must_use]
    pub fn with_port(mut self, index: u16, port: PortConfig) -> Self {
        self.ports.insert(index, port);
        self
    }
}

fn default_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

fn default_http_port() -> u16 {
    80
}

/// Top-level settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `host:port` the notification listener binds to.
    pub listen: String,
    /// Inbound per-line read timeout, in milliseconds.
    pub read_timeout_ms: u64,
    /// Outbound connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Outbound request timeout, in milliseconds.
    pub request_timeout_ms: u64,
    /// Poll a device as soon as it is discovered.
    pub check_online_on_discovery: bool,
    /// Close connections from unconfigured senders without answering.
    pub reject_unknown: bool,
    /// Interval of the background online poller; `0` disables it.
    pub poll_interval_secs: u64,
    /// Wire tokens of the controller firmware.
    pub vocabulary: CommandVocabulary,
    /// Configured controllers.
    pub devices: Vec<DeviceConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            read_timeout_ms: 10_000,
            connect_timeout_ms: 2_000,
            request_timeout_ms: 2_000,
            check_online_on_discovery: true,
            reject_unknown: false,
            poll_interval_secs: 0,
            vocabulary: CommandVocabulary::default(),
            devices: Vec::new(),
        }
    }
}

impl Settings {
    /// Parses and validates a YAML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the YAML is malformed or fails validation.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_yaml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            devices = settings.devices.len(),
            "Loaded configuration"
        );
        Ok(settings)
    }

    /// Checks invariants the rest of the library relies on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on a duplicate device address or an
    /// unparseable listen address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        let mut seen = HashSet::new();
        for device in &self.devices {
            if !seen.insert(device.ip) {
                return Err(ConfigError::DuplicateDevice(device.ip));
            }
        }
        Ok(())
    }

    /// Adds a device.
    #[must_use]
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.devices.push(device);
        self
    }

    /// Returns the parsed listen address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidListenAddress` if it does not parse.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.listen.clone()))
    }

    /// Returns the inbound per-line read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Returns the outbound connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the outbound request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Returns the poller interval, or `None` when polling is disabled.
    #[must_use]
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }

    /// Indexes the devices by address.
    #[must_use]
    pub fn device_map(&self) -> HashMap<IpAddr, DeviceConfig> {
        self.devices.iter().map(|d| (d.ip, d.clone())).collect()
    }
}

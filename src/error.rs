// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `MegaD` library.
//!
//! Failures are grouped by where they come from: outbound communication with
//! a controller, loading the static configuration, and operations addressed
//! to a device or port that does not exist.

use std::net::IpAddr;

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during outbound communication with a device.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The static configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The device has no port with this index in its configuration.
    #[error("device {ip} has no port {index}")]
    PortNotFound {
        /// Address of the device.
        ip: IpAddr,
        /// The requested port index.
        index: u16,
    },

    /// The address does not belong to any configured device.
    #[error("no device configured for {0}")]
    DeviceNotFound(IpAddr),

    /// Socket-level failure on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to outbound HTTP requests to a device.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Connect or read deadline elapsed.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The device answered with a non-success status.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl ProtocolError {
    /// Returns `true` if the request failed because a deadline elapsed.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Errors raised while loading and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML document is malformed or has the wrong shape.
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Two device entries share the same address.
    #[error("device {0} is configured more than once")]
    DuplicateDevice(IpAddr),

    /// The listen address does not parse as `host:port`.
    #[error("invalid listen address: {0}")]
    InvalidListenAddress(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_not_found_display() {
        let err = Error::PortNotFound {
            ip: "192.168.1.14".parse().unwrap(),
            index: 7,
        };
        assert_eq!(err.to_string(), "device 192.168.1.14 has no port 7");
    }

    #[test]
    fn error_from_protocol_error() {
        let err: Error = ProtocolError::Timeout(2000).into();
        assert!(matches!(err, Error::Protocol(ProtocolError::Timeout(2000))));
    }

    #[test]
    fn timeout_is_detected() {
        assert!(ProtocolError::Timeout(10).is_timeout());
        assert!(!ProtocolError::ConnectionFailed("HTTP 500".into()).is_timeout());
    }

    #[test]
    fn duplicate_device_display() {
        let err = ConfigError::DuplicateDevice("10.0.0.2".parse().unwrap());
        assert_eq!(err.to_string(), "device 10.0.0.2 is configured more than once");
    }
}

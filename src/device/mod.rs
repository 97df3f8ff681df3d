// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One `MegaD` controller board and its ports.
//!
//! A [`Device`] owns the [`Port`]s declared in its configuration and a single
//! outbound channel. The physical controller cannot serve concurrent HTTP
//! requests, so the channel admits one request at a time; other callers
//! queue behind it in FIFO order.
//!
//! State flows into the ports from two directions:
//!
//! - inbound pushes, via [`Device::parse_incoming_command`]
//! - outbound polls, via [`Device::process_port_update`] and
//!   [`Device::check_online`]
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use megad_lib::command::CommandVocabulary;
//! use megad_lib::config::{DeviceConfig, PortConfig};
//! use megad_lib::device::Device;
//! use megad_lib::event::LogSink;
//! use megad_lib::protocol::HttpConfig;
//!
//! # async fn example() -> megad_lib::Result<()> {
//! let config = DeviceConfig::new("192.168.1.14".parse().unwrap(), "hall")
//!     .with_port(7, PortConfig::output());
//! let client = HttpConfig::new("192.168.1.14", "sec").into_client()?;
//! let device = Device::new(
//!     &config,
//!     client,
//!     Arc::new(CommandVocabulary::default()),
//!     Arc::new(LogSink),
//! );
//!
//! if device.check_online().await {
//!     device.turn_on(7).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod port_control;

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::command::{self, CommandVocabulary, QueryArgs};
use crate::config::DeviceConfig;
use crate::error::ProtocolError;
use crate::event::NotificationSink;
use crate::port::Port;
use crate::protocol::{CommandResponse, HttpClient, Protocol};
use crate::types::{PortState, PortStatus};

/// A controller board reachable over the network.
pub struct Device<P: Protocol = HttpClient> {
    ip: IpAddr,
    name: Arc<str>,
    id: Option<u32>,
    ports: BTreeMap<u16, Port>,
    protocol: P,
    channel: Mutex<()>,
    vocabulary: Arc<CommandVocabulary>,
    online: AtomicBool,
}

impl<P: Protocol> Device<P> {
    /// Creates a device and its declared ports.
    ///
    /// Every port reports its changes to `sink`. The device starts offline.
    #[must_use]
    pub fn new(
        config: &DeviceConfig,
        protocol: P,
        vocabulary: Arc<CommandVocabulary>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let name: Arc<str> = Arc::from(config.name.as_str());
        let ports = config
            .ports
            .iter()
            .map(|(&index, port)| {
                let port = Port::new(
                    config.ip,
                    Arc::clone(&name),
                    index,
                    port.kind,
                    port.name.clone(),
                    Arc::clone(&sink),
                );
                (index, port)
            })
            .collect();

        Self {
            ip: config.ip,
            name,
            id: config.id,
            ports,
            protocol,
            channel: Mutex::new(()),
            vocabulary,
            online: AtomicBool::new(false),
        }
    }

    /// Returns the device address.
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Returns the configured name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configured numeric identifier.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// Returns the declared ports, ordered by index.
    #[must_use]
    pub fn ports(&self) -> &BTreeMap<u16, Port> {
        &self.ports
    }

    /// Returns the port at `index`, if declared.
    #[must_use]
    pub fn port(&self, index: u16) -> Option<&Port> {
        self.ports.get(&index)
    }

    /// Returns the command vocabulary this device speaks.
    #[must_use]
    pub fn vocabulary(&self) -> &CommandVocabulary {
        &self.vocabulary
    }

    /// Returns the result of the last [`check_online`](Self::check_online).
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns the last known state of every declared port.
    #[must_use]
    pub fn port_states(&self) -> BTreeMap<u16, Option<PortState>> {
        self.ports
            .iter()
            .map(|(&index, port)| (index, port.state()))
            .collect()
    }

    /// Logs the last known state of every declared port at debug level.
    pub fn log_port_status(&self) {
        for port in self.ports.values() {
            tracing::debug!(
                ip = %self.ip,
                port = port.index(),
                state = port.state().map_or("UNKNOWN", |s| s.as_str()),
                "Port status"
            );
        }
    }

    // ========== Outbound channel ==========

    /// Sends a command to the device.
    ///
    /// The request waits for the device's outbound channel, so at most one
    /// request per device is ever in flight. If the command may affect ports
    /// other than the one it addresses (it mentions the default-action or
    /// port-update token), every port is re-read before returning; a failure
    /// of that refresh is logged and does not fail the command.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or times out.
    pub async fn send_command(&self, args: &QueryArgs) -> Result<CommandResponse, ProtocolError> {
        let response = self.request(&args.encode()).await?;

        tracing::debug!(
            ip = %self.ip,
            device = %self.name,
            response = %response.body(),
            "Command answered"
        );

        if self.vocabulary.triggers_refresh(args) {
            // Refresh failures are already logged by process_port_update
            let _ = self.process_port_update().await;
        }

        Ok(response)
    }

    async fn request(&self, query: &str) -> Result<CommandResponse, ProtocolError> {
        let _in_flight = self.channel.lock().await;

        self.protocol.send_raw(query).await.inspect_err(|e| {
            tracing::error!(ip = %self.ip, query = %query, error = %e, "Command failed");
        })
    }

    // ========== Polling ==========

    /// Fetches the raw `;`-delimited status of every port.
    ///
    /// The poll goes straight to the outbound channel and never triggers a
    /// refresh of its own.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or times out.
    pub async fn fetch_all_statuses(&self) -> Result<String, ProtocolError> {
        let args = self.vocabulary.fetch_all_command();
        self.request(&args.encode())
            .await
            .map(CommandResponse::into_body)
    }

    /// Fetches the status of the port at position `index`.
    ///
    /// Returns `Ok(None)` with a warning when the device reports fewer
    /// ports than `index + 1`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or times out.
    pub async fn fetch_port_status(&self, index: u16) -> Result<Option<PortStatus>, ProtocolError> {
        let statuses = self.fetch_all_statuses().await?;

        let status = statuses
            .split(';')
            .nth(usize::from(index))
            .map(PortStatus::parse);

        if status.is_none() {
            tracing::warn!(ip = %self.ip, device = %self.name, port = index, "Can't fetch unknown port");
        }
        Ok(status)
    }

    /// Polls every port and applies the result.
    ///
    /// Returns the number of ports whose state changed.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the poll fails; ports are left untouched.
    pub async fn process_port_update(&self) -> Result<usize, ProtocolError> {
        let statuses = self.fetch_all_statuses().await.inspect_err(|_| {
            tracing::error!(ip = %self.ip, device = %self.name, "Can't fetch port status");
        })?;

        Ok(self.set_port_status(&statuses, None, None))
    }

    /// Polls every port, applies the result, and records whether the
    /// device answered.
    pub async fn check_online(&self) -> bool {
        let online = self.process_port_update().await.is_ok();
        let was_online = self.online.swap(online, Ordering::SeqCst);

        if online && !was_online {
            tracing::info!(ip = %self.ip, device = %self.name, "Device is online");
        } else if !online && was_online {
            tracing::warn!(ip = %self.ip, device = %self.name, "Device went offline");
        }
        online
    }

    // ========== Status application ==========

    /// Applies a reported status.
    ///
    /// Without `index`, `status` is the `;`-delimited list of every port,
    /// positionally aligned with port indices. With `index`, `status` is one
    /// token for that port and `count`, when given, overrides a count
    /// embedded in the token.
    ///
    /// Indices the configuration does not declare are skipped.
    ///
    /// Returns the number of ports whose state changed.
    pub fn set_port_status(&self, status: &str, index: Option<u16>, count: Option<u32>) -> usize {
        match index {
            None => PortStatus::parse_list(status)
                .into_iter()
                .enumerate()
                .filter(|&(position, parsed)| {
                    u16::try_from(position).is_ok_and(|index| self.apply_status(index, parsed))
                })
                .count(),
            Some(index) => {
                let mut parsed = PortStatus::parse(status);
                if count.is_some() {
                    parsed.count = count;
                }
                usize::from(self.apply_status(index, parsed))
            }
        }
    }

    fn apply_status(&self, index: u16, status: PortStatus) -> bool {
        let Some(port) = self.ports.get(&index) else {
            tracing::debug!(
                ip = %self.ip,
                device = %self.name,
                port = index,
                status = %status,
                "Port is not declared in configuration, skipping"
            );
            return false;
        };
        port.apply(status)
    }

    // ========== Inbound notifications ==========

    /// Handles a request target pushed by the device.
    ///
    /// An all-status value is applied directly. A single-port update only
    /// carries the port index, so every port is re-read; when that poll
    /// fails, the push's own off-hint is applied to the addressed port.
    ///
    /// Returns the number of ports whose state changed.
    pub async fn parse_incoming_command(&self, target: &str) -> usize {
        let command = command::decode(target);

        tracing::info!(ip = %self.ip, device = %self.name, command = %target, "Incoming command");

        let mut changed = 0;

        if let Some(statuses) = non_empty(&command, &self.vocabulary.all) {
            changed += self.set_port_status(statuses, None, None);
        }

        if let Some(updated) = non_empty(&command, &self.vocabulary.port_update) {
            match self.process_port_update().await {
                Ok(n) => changed += n,
                Err(_) => changed += self.apply_push_hint(updated, &command),
            }
        }

        changed
    }

    fn apply_push_hint(
        &self,
        updated: &str,
        command: &std::collections::HashMap<String, String>,
    ) -> usize {
        let Ok(index) = updated.parse::<u16>() else {
            tracing::debug!(ip = %self.ip, port = %updated, "Unparseable port index in push");
            return 0;
        };
        let off = non_empty(command, &self.vocabulary.port_off).is_some_and(|v| v != "0");
        let state = PortState::from(!off);

        usize::from(self.apply_status(index, PortStatus { state, count: None }))
    }
}

fn non_empty<'a>(
    command: &'a std::collections::HashMap<String, String>,
    key: &str,
) -> Option<&'a str> {
    command
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

impl<P: Protocol> fmt::Debug for Device<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("ip", &self.ip)
            .field("name", &self.name)
            .field("id", &self.id)
            .field("ports", &self.ports)
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl<P: Protocol> fmt::Display for Device<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.ip)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory protocol for device tests.

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    /// Answers the fetch-all query with a configurable status string and
    /// every other query with a configurable reply. `None` answers fail
    /// with a timeout.
    #[derive(Debug, Default)]
    pub(crate) struct FakeProtocol {
        pub statuses: Mutex<Option<String>>,
        pub reply: Mutex<Option<String>>,
        pub requests: Mutex<Vec<String>>,
        pub delay: Duration,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl FakeProtocol {
        pub(crate) fn with_statuses(statuses: &str) -> Self {
            Self {
                statuses: Mutex::new(Some(statuses.to_string())),
                reply: Mutex::new(Some(String::new())),
                ..Self::default()
            }
        }

        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl Protocol for FakeProtocol {
        async fn send_raw(&self, query: &str) -> Result<CommandResponse, ProtocolError> {
            self.requests.lock().push(query.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let answer = if query == "?cmd=all" {
                self.statuses.lock().clone()
            } else {
                self.reply.lock().clone()
            };
            answer
                .map(CommandResponse::new)
                .ok_or(ProtocolError::Timeout(2000))
        }
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of configured controllers.
//!
//! Devices are created lazily, the first time their address is referenced,
//! and live for the rest of the process. Creation is single-flight: any
//! number of concurrent [`resolve`](DeviceRegistry::resolve) calls for the
//! same new address build exactly one [`Device`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use megad_lib::config::Settings;
//! use megad_lib::event::LogSink;
//! use megad_lib::registry::DeviceRegistry;
//!
//! # async fn example() -> megad_lib::Result<()> {
//! let settings = Settings::load("megad.yaml")?;
//! let registry = DeviceRegistry::new(&settings, Arc::new(LogSink));
//!
//! for device in registry.discover_all().await {
//!     println!("{device}: online = {}", device.is_online());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;

use crate::command::CommandVocabulary;
use crate::config::{DeviceConfig, Settings};
use crate::device::Device;
use crate::error::ProtocolError;
use crate::event::NotificationSink;
use crate::protocol::{HttpClient, HttpConfig, Protocol};

type Connector<P> = dyn Fn(&DeviceConfig) -> Result<P, ProtocolError> + Send + Sync;

/// Maps device addresses to live [`Device`]s.
pub struct DeviceRegistry<P: Protocol = HttpClient> {
    configs: HashMap<IpAddr, DeviceConfig>,
    vocabulary: Arc<CommandVocabulary>,
    sink: Arc<dyn NotificationSink>,
    check_online_on_discovery: bool,
    connector: Box<Connector<P>>,
    devices: Mutex<HashMap<IpAddr, Arc<OnceCell<Arc<Device<P>>>>>>,
}

impl DeviceRegistry<HttpClient> {
    /// Creates a registry that reaches devices over HTTP.
    ///
    /// Every device reports port changes to `sink`.
    #[must_use]
    pub fn new(settings: &Settings, sink: Arc<dyn NotificationSink>) -> Self {
        let connect_timeout = settings.connect_timeout();
        let request_timeout = settings.request_timeout();

        Self::with_connector(settings, sink, move |config| {
            HttpConfig::new(host_for(config.ip), config.password.clone())
                .with_port(config.http_port)
                .with_connect_timeout(connect_timeout)
                .with_request_timeout(request_timeout)
                .into_client()
        })
    }
}

impl<P: Protocol> DeviceRegistry<P> {
    /// Creates a registry that builds each device's transport with
    /// `connector`.
    #[must_use]
    pub fn with_connector<F>(settings: &Settings, sink: Arc<dyn NotificationSink>, connector: F) -> Self
    where
        F: Fn(&DeviceConfig) -> Result<P, ProtocolError> + Send + Sync + 'static,
    {
        Self {
            configs: settings.device_map(),
            vocabulary: Arc::new(settings.vocabulary.clone()),
            sink,
            check_online_on_discovery: settings.check_online_on_discovery,
            connector: Box::new(connector),
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if `ip` belongs to a configured device.
    #[must_use]
    pub fn is_configured(&self, ip: IpAddr) -> bool {
        self.configs.contains_key(&ip)
    }

    /// Returns the addresses of every configured device.
    #[must_use]
    pub fn configured(&self) -> Vec<IpAddr> {
        let mut ips: Vec<_> = self.configs.keys().copied().collect();
        ips.sort_unstable();
        ips
    }

    /// Returns the device at `ip`, creating it on first reference.
    ///
    /// Returns `None` if `ip` is not configured or its transport could not
    /// be built. A device that fails its first online check is still
    /// registered, marked offline.
    pub async fn resolve(&self, ip: IpAddr) -> Option<Arc<Device<P>>> {
        let config = self.configs.get(&ip)?;
        let cell = Arc::clone(self.devices.lock().entry(ip).or_default());

        cell.get_or_try_init(|| self.discover(config))
            .await
            .ok()
            .cloned()
    }

    async fn discover(&self, config: &DeviceConfig) -> Result<Arc<Device<P>>, ProtocolError> {
        let protocol = (self.connector)(config).inspect_err(|e| {
            tracing::error!(ip = %config.ip, error = %e, "Can't build device transport");
        })?;

        let device = Arc::new(Device::new(
            config,
            protocol,
            Arc::clone(&self.vocabulary),
            Arc::clone(&self.sink),
        ));

        tracing::info!(
            ip = %config.ip,
            device = %config.name,
            ports = config.ports.len(),
            "Discovered device"
        );

        if self.check_online_on_discovery {
            device.check_online().await;
        }
        Ok(device)
    }

    /// Returns the device at `ip` if it has already been created.
    #[must_use]
    pub fn get(&self, ip: IpAddr) -> Option<Arc<Device<P>>> {
        self.devices
            .lock()
            .get(&ip)
            .and_then(|cell| cell.get().cloned())
    }

    /// Returns every device created so far, ordered by address.
    #[must_use]
    pub fn devices(&self) -> Vec<Arc<Device<P>>> {
        let mut devices: Vec<_> = self
            .devices
            .lock()
            .values()
            .filter_map(|cell| cell.get().cloned())
            .collect();
        devices.sort_unstable_by_key(|d| d.ip());
        devices
    }

    /// Creates every configured device.
    pub async fn discover_all(&self) -> Vec<Arc<Device<P>>> {
        let mut devices = Vec::with_capacity(self.configs.len());
        for ip in self.configured() {
            if let Some(device) = self.resolve(ip).await {
                devices.push(device);
            }
        }
        devices
    }

    /// Polls every live device concurrently.
    ///
    /// Returns each device's address and whether it answered, ordered by
    /// address.
    pub async fn check_all_online(&self) -> Vec<(IpAddr, bool)> {
        let mut checks = JoinSet::new();
        for device in self.devices() {
            checks.spawn(async move { (device.ip(), device.check_online().await) });
        }

        let mut results = Vec::with_capacity(checks.len());
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "Online check task failed"),
            }
        }
        results.sort_unstable_by_key(|&(ip, _)| ip);
        results
    }
}

impl<P: Protocol> fmt::Debug for DeviceRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("configured", &self.configs.len())
            .field("live", &self.devices().len())
            .field("check_online_on_discovery", &self.check_online_on_discovery)
            .finish_non_exhaustive()
    }
}

fn host_for(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

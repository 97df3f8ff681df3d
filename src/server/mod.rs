// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TCP listener for notifications pushed by controllers.
//!
//! Controllers report input changes by issuing a plain `GET` to a configured
//! server address. The [`Server`] reads the request line, hands the target to
//! the sending [`Device`](crate::device::Device), and answers with a fixed
//! `200 OK`.
//!
//! Connections from the same device are processed strictly in accept order:
//! each configured address gets an inbound lane, a queue drained by one
//! task. Connections from unknown addresses are handled independently.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use megad_lib::config::Settings;
//! use megad_lib::event::LogSink;
//! use megad_lib::server::Server;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> megad_lib::Result<()> {
//! let settings = Settings::load("megad.yaml")?;
//! let server = Server::from_settings(&settings, Arc::new(LogSink));
//! let shutdown = CancellationToken::new();
//!
//! server.serve(settings.listen_addr()?, shutdown).await?;
//! # Ok(())
//! # }
//! ```

mod request;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::Error;
use crate::event::NotificationSink;
use crate::protocol::{HttpClient, Protocol};
use crate::registry::DeviceRegistry;

/// The fixed answer sent to every accepted notification.
pub const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; set=iso-8859-1\r\n\r\n";

/// Longest accepted request or header line, in bytes.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Listener behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Deadline for each inbound line.
    pub read_timeout: Duration,
    /// Close connections from unconfigured senders without answering.
    pub reject_unknown: bool,
    /// Longest accepted line.
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            reject_unknown: false,
            max_line_length: MAX_LINE_LENGTH,
        }
    }
}

impl From<&Settings> for ServerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            read_timeout: settings.read_timeout(),
            reject_unknown: settings.reject_unknown,
            max_line_length: MAX_LINE_LENGTH,
        }
    }
}

/// Accepts device notifications and routes them to the registry.
pub struct Server<P: Protocol = HttpClient> {
    registry: Arc<DeviceRegistry<P>>,
    config: ServerConfig,
}

impl<P: Protocol> Clone for Server<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}

impl Server<HttpClient> {
    /// Creates a server and its HTTP-backed registry from settings.
    #[must_use]
    pub fn from_settings(settings: &Settings, sink: Arc<dyn NotificationSink>) -> Self {
        Self::new(
            Arc::new(DeviceRegistry::new(settings, sink)),
            ServerConfig::from(settings),
        )
    }
}

impl<P: Protocol> Server<P> {
    /// Creates a server over an existing registry.
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry<P>>, config: ServerConfig) -> Self {
        Self { registry, config }
    }

    /// Returns the registry notifications are routed to.
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry<P>> {
        &self.registry
    }

    /// Returns the listener configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds `addr` and serves until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the address cannot be bound.
    pub async fn serve(&self, addr: SocketAddr, shutdown: CancellationToken) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        self.run(listener, shutdown).await
    }

    /// Accepts connections on `listener` until `shutdown` is cancelled.
    ///
    /// Connections already queued on a device's lane are still processed
    /// after cancellation.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the listener's local address is unavailable.
    pub async fn run(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), Error> {
        tracing::info!(addr = %listener.local_addr()?, "Listening for device notifications");

        let mut lanes: HashMap<IpAddr, mpsc::UnboundedSender<TcpStream>> = HashMap::new();

        loop {
            let (stream, peer) = tokio::select! {
                () = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
            };

            let ip = peer.ip().to_canonical();
            tracing::debug!(peer = %peer, "Accepted connection");

            if self.registry.is_configured(ip) {
                let lane = lanes.entry(ip).or_insert_with(|| self.spawn_lane(ip));
                if lane.send(stream).is_err() {
                    tracing::error!(ip = %ip, "Inbound lane closed, dropping connection");
                    lanes.remove(&ip);
                }
            } else {
                let server = self.clone();
                tokio::spawn(async move { server.handle_connection(stream, ip).await });
            }
        }

        tracing::info!("Listener stopped");
        Ok(())
    }

    fn spawn_lane(&self, ip: IpAddr) -> mpsc::UnboundedSender<TcpStream> {
        let (tx, mut rx) = mpsc::unbounded_channel::<TcpStream>();
        let server = self.clone();

        tokio::spawn(async move {
            while let Some(stream) = rx.recv().await {
                server.handle_connection(stream, ip).await;
            }
            tracing::debug!(ip = %ip, "Inbound lane closed");
        });
        tx
    }

    /// Reads one notification from `stream` and answers it.
    ///
    /// Once the request has been read, a configured device always gets
    /// [`OK_RESPONSE`], whether or not it carried a usable command. Only a
    /// read timeout or an oversized line closes the connection silently.
    async fn handle_connection(&self, mut stream: TcpStream, ip: IpAddr) {
        let (read_half, mut write_half) = stream.split();
        let mut reader = BufReader::new(read_half);

        let target = match request::read_request_target(
            &mut reader,
            self.config.read_timeout,
            self.config.max_line_length,
        )
        .await
        {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(ip = %ip, error = %e, "Failed to read request, closing");
                return;
            }
        };

        if self.registry.is_configured(ip) {
            self.dispatch(ip, target.as_deref()).await;
        } else if self.config.reject_unknown {
            tracing::warn!(ip = %ip, target = ?target, "Rejected request from unknown sender");
            return;
        } else {
            tracing::warn!(ip = %ip, target = ?target, "Request from unknown sender");
        }

        if let Err(e) = write_half.write_all(OK_RESPONSE).await {
            tracing::debug!(ip = %ip, error = %e, "Failed to send response");
            return;
        }
        let _ = write_half.shutdown().await;
    }

    async fn dispatch(&self, ip: IpAddr, target: Option<&str>) {
        let Some(target) = target else {
            tracing::debug!(ip = %ip, "No GET target in request");
            return;
        };
        match self.registry.resolve(ip).await {
            Some(device) => {
                device.parse_incoming_command(target).await;
                device.log_port_status();
            }
            None => {
                tracing::warn!(ip = %ip, target = %target, "Configured device unavailable");
            }
        }
    }

    /// Periodically checks every live device until `shutdown` is cancelled.
    ///
    /// Returns `None` without spawning when `interval` is zero.
    #[must_use]
    pub fn spawn_poller(&self, interval: Duration, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            return None;
        }
        let registry = Arc::clone(&self.registry);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        for (ip, online) in registry.check_all_online().await {
                            tracing::debug!(ip = %ip, online, "Polled device");
                        }
                    }
                }
            }
            tracing::debug!("Poller stopped");
        }))
    }
}

impl<P: Protocol> std::fmt::Debug for Server<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::config::{DeviceConfig, PortConfig};
    use crate::device::testing::FakeProtocol;
    use crate::error::ProtocolError;
    use crate::event::NoopSink;
    use crate::types::PortState;

    async fn start(settings: &Settings) -> (Server<FakeProtocol>, SocketAddr, CancellationToken) {
        let registry = DeviceRegistry::with_connector(settings, Arc::new(NoopSink), |_| {
            Ok(FakeProtocol::with_statuses("off;off;on"))
        });
        let server = Server::new(Arc::new(registry), ServerConfig::from(settings));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let running = server.clone();
        let token = shutdown.clone();
        tokio::spawn(async move { running.run(listener, token).await });

        (server, addr, shutdown)
    }

    async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        response
    }

    fn local_device() -> DeviceConfig {
        DeviceConfig::new("127.0.0.1".parse().unwrap(), "local")
            .with_port(2, PortConfig::input())
    }

    #[tokio::test]
    async fn known_device_is_updated_before_answer() {
        let settings = Settings::default().with_device(local_device());
        let (server, addr, shutdown) = start(&settings).await;

        let response = exchange(addr, b"GET /?pt=2&m=0 HTTP/1.1\r\n\r\n").await;

        assert_eq!(response, OK_RESPONSE);
        let device = server.registry().get("127.0.0.1".parse().unwrap()).unwrap();
        assert_eq!(device.port(2).unwrap().state(), Some(PortState::On));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn unknown_sender_is_acknowledged_by_default() {
        let (server, addr, shutdown) = start(&Settings::default()).await;

        let response = exchange(addr, b"GET /?pt=1 HTTP/1.1\r\n\r\n").await;

        assert_eq!(response, OK_RESPONSE);
        assert!(server.registry().devices().is_empty());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn unknown_sender_is_refused_when_configured() {
        let settings = Settings {
            reject_unknown: true,
            ..Settings::default()
        };
        let (_server, addr, shutdown) = start(&settings).await;

        let response = exchange(addr, b"GET /?pt=1 HTTP/1.1\r\n\r\n").await;

        assert!(response.is_empty());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn known_device_is_answered_without_a_usable_command() {
        let settings = Settings::default().with_device(local_device());
        let (server, addr, shutdown) = start(&settings).await;

        for request in [
            &b"HEAD /?pt=2 HTTP/1.1\r\n\r\n"[..],
            b"GET\r\n\r\n",
            b"\r\n",
        ] {
            let response = tokio::time::timeout(Duration::from_secs(2), exchange(addr, request))
                .await
                .expect("answered before the read timeout");
            assert_eq!(response, OK_RESPONSE);
        }

        assert!(server.registry().devices().is_empty());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn unknown_sender_with_garbage_is_acknowledged() {
        let (_server, addr, shutdown) = start(&Settings::default()).await;

        let response = exchange(addr, b"HELLO\r\n\r\n").await;

        assert_eq!(response, OK_RESPONSE);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn configured_device_without_transport_is_still_answered() {
        let settings = Settings {
            reject_unknown: true,
            ..Settings::default()
        }
        .with_device(local_device());
        let registry = DeviceRegistry::with_connector(&settings, Arc::new(NoopSink), |config| {
            Err::<FakeProtocol, _>(ProtocolError::InvalidAddress(config.ip.to_string()))
        });
        let server = Server::new(Arc::new(registry), ServerConfig::from(&settings));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let running = server.clone();
        let token = shutdown.clone();
        tokio::spawn(async move { running.run(listener, token).await });

        let response = exchange(addr, b"GET /?pt=2 HTTP/1.1\r\n\r\n").await;

        assert_eq!(response, OK_RESPONSE);
        assert!(server.registry().devices().is_empty());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn zero_interval_disables_poller() {
        let (server, _addr, shutdown) = start(&Settings::default()).await;
        assert!(server.spawn_poller(Duration::ZERO, shutdown.clone()).is_none());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn poller_stops_on_cancel() {
        let settings = Settings::default().with_device(local_device());
        let (server, _addr, shutdown) = start(&settings).await;
        server.registry().discover_all().await;

        let poller = server
            .spawn_poller(Duration::from_millis(10), shutdown.clone())
            .unwrap();
        shutdown.cancel();

        poller.await.unwrap();
    }
}

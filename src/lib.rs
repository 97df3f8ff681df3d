// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `MegaD` Lib - A Rust library to keep in sync with `MegaD` I/O controllers.
//!
//! `MegaD` boards expose a set of numbered ports, inputs (switches, buttons,
//! sensors) and outputs (relays). This library mirrors the state of every
//! configured port and keeps it current from two directions:
//!
//! - **Inbound**: boards push a `GET` request to a configured server address
//!   whenever an input changes; the [`Server`] receives it and updates the
//!   matching ports.
//! - **Outbound**: the library polls boards and sends switch commands over
//!   HTTP, one request at a time per board.
//!
//! Every actual change of a port's state is reported exactly once to a
//! [`NotificationSink`]: a closure, the [`EventBus`], or your own type.
//!
//! # Quick Start
//!
//! ## Listening for changes
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use megad_lib::{EventBus, Server, Settings};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> megad_lib::Result<()> {
//!     let settings = Settings::load("megad.yaml")?;
//!
//!     let bus = EventBus::new();
//!     let mut events = bus.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{}:{} is now {}", event.device_name, event.port, event.state);
//!         }
//!     });
//!
//!     let server = Server::from_settings(&settings, Arc::new(bus));
//!     server.registry().discover_all().await;
//!     server
//!         .serve(settings.listen_addr()?, CancellationToken::new())
//!         .await
//! }
//! ```
//!
//! ## Switching an output
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use megad_lib::event::PortParams;
//! use megad_lib::{DeviceRegistry, Port, Settings};
//!
//! #[tokio::main]
//! async fn main() -> megad_lib::Result<()> {
//!     let settings = Settings::load("megad.yaml")?;
//!     let on_change = |port: &Port, params: PortParams| {
//!         println!("{port} -> {}", params.state);
//!     };
//!     let registry = DeviceRegistry::new(&settings, Arc::new(on_change));
//!
//!     let ip = "192.168.1.14".parse().unwrap();
//!     let device = registry
//!         .resolve(ip)
//!         .await
//!         .ok_or(megad_lib::Error::DeviceNotFound(ip))?;
//!
//!     device.turn_on(7).await?;
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod port;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod types;

pub use command::{CommandVocabulary, QueryArgs};
pub use config::{DeviceConfig, PortConfig, Settings};
pub use device::Device;
pub use error::{ConfigError, Error, ProtocolError, Result};
pub use event::{EventBus, LogSink, NoopSink, NotificationSink, PortEvent};
pub use port::Port;
pub use protocol::{HttpClient, HttpConfig};
pub use registry::DeviceRegistry;
pub use server::{Server, ServerConfig};
pub use types::{PortKind, PortState, PortStatus};

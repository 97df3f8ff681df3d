// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notification of port state changes.
//!
//! Every [`Port`](crate::port::Port) is created with a [`NotificationSink`]
//! and calls it exactly once per actual state change. The library ships
//! several sinks:
//!
//! - [`NoopSink`] - discards notifications
//! - [`LogSink`] - writes one `tracing` event per change
//! - [`EventBus`] - republishes changes as [`PortEvent`]s on a broadcast
//!   channel, for any number of async subscribers
//! - any `Fn(&Port, PortParams) + Send + Sync` closure
//!
//! # Examples
//!
//! ```
//! use megad_lib::event::EventBus;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! // Hand the bus to the registry as its sink; receive events in a task:
//! // while let Ok(event) = rx.recv().await { ... }
//! # drop(rx);
//! ```

mod event_bus;
mod port_event;
mod sink;

pub use event_bus::EventBus;
pub use port_event::{PortEvent, PortParams};
pub use sink::{LogSink, NoopSink, NotificationSink};

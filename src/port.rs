// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State machine for one input or output line of a device.
//!
//! A [`Port`] holds the last known state and pulse count of one line. State
//! updates are idempotent: setting the current state again is a no-op and
//! does not reach the [`NotificationSink`]. A real change updates the state
//! and notifies the sink exactly once.
//!
//! Ports never talk to the wire. Commands addressed to a port go through the
//! owning [`Device`](crate::device::Device), which dispatches on the port's
//! [`PortKind`].

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::{NotificationSink, PortParams};
use crate::types::{PortKind, PortState, PortStatus};

#[derive(Debug, Clone, Copy, Default)]
struct Reading {
    state: Option<PortState>,
    count: Option<u32>,
}

/// One physical line of a device.
pub struct Port {
    index: u16,
    kind: PortKind,
    name: Option<String>,
    device_ip: IpAddr,
    device_name: Arc<str>,
    reading: Mutex<Reading>,
    sink: Arc<dyn NotificationSink>,
}

impl Port {
    /// Creates a port whose state is not yet known.
    #[must_use]
    pub fn new(
        device_ip: IpAddr,
        device_name: Arc<str>,
        index: u16,
        kind: PortKind,
        name: Option<String>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            index,
            kind,
            name,
            device_ip,
            device_name,
            reading: Mutex::new(Reading::default()),
            sink,
        }
    }

    /// Returns the port index on its device.
    #[must_use]
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Returns the declared kind.
    #[must_use]
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Returns the configured name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the address of the owning device.
    #[must_use]
    pub fn device_ip(&self) -> IpAddr {
        self.device_ip
    }

    /// Returns the name of the owning device.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Returns the last known state, or `None` if the device never reported
    /// this port.
    #[must_use]
    pub fn state(&self) -> Option<PortState> {
        self.reading.lock().state
    }

    /// Returns the last reported pulse count.
    #[must_use]
    pub fn count(&self) -> Option<u32> {
        self.reading.lock().count
    }

    /// Returns `true` if the last known state is on.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.state().is_some_and(|s| s.is_on())
    }

    /// Stable identifier of the form `<device>_<index>_<name>`, lowercased
    /// with spaces replaced by underscores.
    #[must_use]
    pub fn entity_id(&self) -> String {
        let id = match &self.name {
            Some(name) => format!("{}_{}_{name}", self.device_name, self.index),
            None => format!("{}_{}", self.device_name, self.index),
        };
        id.to_lowercase().replace(' ', "_")
    }

    /// Sets the state.
    ///
    /// Returns `false` without notifying when `state` equals the current
    /// state. Otherwise stores it, notifies the sink once with the current
    /// count, and returns `true`.
    pub fn set_state(&self, state: PortState) -> bool {
        let params = {
            let mut reading = self.reading.lock();
            if reading.state == Some(state) {
                return false;
            }
            reading.state = Some(state);
            PortParams {
                state,
                count: reading.count,
            }
        };

        tracing::debug!(
            ip = %self.device_ip,
            port = self.index,
            state = %state,
            "Port state updated"
        );
        self.sink.notify(self, params);
        true
    }

    /// Stores a pulse count. Never notifies by itself.
    pub fn set_count(&self, count: u32) {
        self.reading.lock().count = Some(count);
    }

    /// Applies a parsed status token: the count first, so that it travels
    /// with the state-change notification, then the state.
    ///
    /// Returns `true` if the state changed.
    pub fn apply(&self, status: PortStatus) -> bool {
        if let Some(count) = status.count {
            self.set_count(count);
        }
        self.set_state(status.state)
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reading = *self.reading.lock();
        f.debug_struct("Port")
            .field("device_ip", &self.device_ip)
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("state", &reading.state)
            .field("count", &reading.count)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} port {}: {}#{}",
            self.kind,
            self.index,
            self.device_ip,
            self.name.as_deref().unwrap_or("-")
        )
    }
}

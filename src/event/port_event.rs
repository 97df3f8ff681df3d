// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Port change payloads.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::port::Port;
use crate::types::{PortKind, PortState};

/// Parameters passed to a sink along with the changed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortParams {
    /// The new state.
    pub state: PortState,
    /// The pulse count known at the time of the change.
    pub count: Option<u32>,
}

/// An owned, timestamped record of one port state change.
///
/// Unlike the borrowed [`Port`] handed to a sink, a `PortEvent` can be sent
/// across tasks and serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortEvent {
    /// Address of the device owning the port.
    pub device_ip: IpAddr,
    /// Configured device name.
    pub device_name: String,
    /// Port index.
    pub port: u16,
    /// Declared port kind.
    pub kind: PortKind,
    /// Configured port name, if any.
    pub port_name: Option<String>,
    /// The new state.
    pub state: PortState,
    /// The pulse count known at the time of the change.
    pub count: Option<u32>,
    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
}

impl PortEvent {
    /// Captures a change of `port`.
    #[must_use]
    pub fn new(port: &Port, params: PortParams) -> Self {
        Self {
            device_ip: port.device_ip(),
            device_name: port.device_name().to_string(),
            port: port.index(),
            kind: port.kind(),
            port_name: port.name().map(str::to_string),
            state: params.state,
            count: params.count,
            timestamp: Utc::now(),
        }
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Port state types for `MegaD` controllers.
//!
//! This module provides the on/off state of a port, the declared kind of a
//! port, and the parsed form of one status token as reported by a device.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents the state of one port.
///
/// # Examples
///
/// ```
/// use megad_lib::types::PortState;
///
/// assert_eq!(PortState::On.as_str(), "ON");
/// assert_eq!(PortState::from(false), PortState::Off);
/// assert!(PortState::On.is_on());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortState {
    /// The line is inactive / the relay is open.
    Off,
    /// The line is active / the relay is closed.
    On,
}

impl PortState {
    /// Returns the display string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    /// Returns `true` for [`PortState::On`].
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<bool> for PortState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

/// Declared kind of a port.
///
/// Inputs are sensor or momentary lines whose state only ever comes from the
/// device. Outputs are relays that accept on/off commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Sensor or button line.
    Input,
    /// Relay line.
    Output,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// State of one port as reported in a status token.
///
/// A token is `STATE` or `STATE/COUNT`, compared case-insensitively. Only
/// `on` means on; every other token, including analog readings, reads as off.
///
/// # Examples
///
/// ```
/// use megad_lib::types::{PortState, PortStatus};
///
/// let status = PortStatus::parse("OFF/4");
/// assert_eq!(status.state, PortState::Off);
/// assert_eq!(status.count, Some(4));
///
/// assert_eq!(PortStatus::parse("on").count, None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStatus {
    /// Reported state.
    pub state: PortState,
    /// Pulse counter, present for counted inputs.
    pub count: Option<u32>,
}

impl PortStatus {
    /// Parses one status token. Never fails.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim().to_ascii_lowercase();

        let (state, count) = match token.split_once('/') {
            Some((state, count)) if state == "on" || state == "off" => {
                (state, count.trim().parse().ok())
            }
            _ => (token.as_str(), None),
        };

        Self {
            state: PortState::from(state == "on"),
            count,
        }
    }

    /// Parses a `;`-delimited status list, positionally aligned with port
    /// indices.
    #[must_use]
    pub fn parse_list(statuses: &str) -> Vec<Self> {
        statuses.split(';').map(Self::parse).collect()
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            Some(count) => write!(f, "{}/{count}", self.state),
            None => write!(f, "{}", self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_states() {
        assert_eq!(PortStatus::parse("on").state, PortState::On);
        assert_eq!(PortStatus::parse("ON").state, PortState::On);
        assert_eq!(PortStatus::parse("off").state, PortState::Off);
    }

    #[test]
    fn parse_counted_state() {
        let status = PortStatus::parse("on/17");
        assert_eq!(status.state, PortState::On);
        assert_eq!(status.count, Some(17));
    }

    #[test]
    fn parse_non_binary_token_reads_off() {
        let status = PortStatus::parse("512");
        assert_eq!(status.state, PortState::Off);
        assert_eq!(status.count, None);

        let status = PortStatus::parse("temp:24.5/1");
        assert_eq!(status.state, PortState::Off);
        assert_eq!(status.count, None);
    }

    #[test]
    fn parse_bad_count_is_dropped() {
        let status = PortStatus::parse("off/x");
        assert_eq!(status.state, PortState::Off);
        assert_eq!(status.count, None);
    }

    #[test]
    fn parse_list_keeps_positions() {
        let list = PortStatus::parse_list("on;off/4;;on");
        assert_eq!(list.len(), 4);
        assert_eq!(list[1].count, Some(4));
        assert_eq!(list[2].state, PortState::Off);
        assert_eq!(list[3].state, PortState::On);
    }

    #[test]
    fn display_round_trips_count() {
        let status = PortStatus {
            state: PortState::On,
            count: Some(3),
        };
        assert_eq!(status.to_string(), "ON/3");
    }

    #[test]
    fn port_kind_deserializes_lowercase() {
        let kind: PortKind = serde_yaml::from_str("output").unwrap();
        assert_eq!(kind, PortKind::Output);
    }
}

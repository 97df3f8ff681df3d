// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands addressed to a single port.
//!
//! Output ports switch a relay: the state is updated only once the device
//! has accepted the command. Input ports cannot be switched; "turning one
//! on" asks the device to run the default action bound to it, after which
//! the port reads as off again.

use crate::error::Error;
use crate::port::Port;
use crate::protocol::Protocol;
use crate::types::{PortKind, PortState};

use super::Device;

impl<P: Protocol> Device<P> {
    /// Turns the port at `index` on.
    ///
    /// # Errors
    ///
    /// Returns `Error::PortNotFound` if the port is not declared, or
    /// `Error::Protocol` if the device did not accept the command.
    pub async fn turn_on(&self, index: u16) -> Result<(), Error> {
        let port = self.declared_port(index)?;
        match port.kind() {
            PortKind::Output => self.switch_output(port, true).await,
            PortKind::Input => self.run_default_action(port).await,
        }
    }

    /// Turns the port at `index` off.
    ///
    /// For an input port this only resets the local state.
    ///
    /// # Errors
    ///
    /// Returns `Error::PortNotFound` if the port is not declared, or
    /// `Error::Protocol` if the device did not accept the command.
    pub async fn turn_off(&self, index: u16) -> Result<(), Error> {
        let port = self.declared_port(index)?;
        match port.kind() {
            PortKind::Output => self.switch_output(port, false).await,
            PortKind::Input => {
                port.set_state(PortState::Off);
                Ok(())
            }
        }
    }

    /// Flips the port at `index` based on its last known state.
    ///
    /// A port whose state is unknown is turned on.
    ///
    /// # Errors
    ///
    /// Same as [`turn_on`](Self::turn_on) and [`turn_off`](Self::turn_off).
    pub async fn toggle(&self, index: u16) -> Result<(), Error> {
        if self.declared_port(index)?.is_on() {
            self.turn_off(index).await
        } else {
            self.turn_on(index).await
        }
    }

    fn declared_port(&self, index: u16) -> Result<&Port, Error> {
        self.port(index).ok_or(Error::PortNotFound {
            ip: self.ip(),
            index,
        })
    }

    async fn switch_output(&self, port: &Port, on: bool) -> Result<(), Error> {
        let args = self.vocabulary().output_command(port.index(), on);
        self.send_command(&args).await?;
        port.set_state(PortState::from(on));
        Ok(())
    }

    async fn run_default_action(&self, port: &Port) -> Result<(), Error> {
        let args = self.vocabulary().default_action_command(port.index());
        let result = self.send_command(&args).await;

        match &result {
            Ok(response) if response.body().trim() == self.vocabulary().done => {
                tracing::info!(ip = %self.ip(), port = port.index(), "Default action executed");
            }
            Ok(response) => {
                tracing::warn!(
                    ip = %self.ip(),
                    port = port.index(),
                    response = %response.body(),
                    "Default action not confirmed"
                );
            }
            Err(_) => {}
        }

        port.set_state(PortState::Off);
        result.map(drop).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::command::CommandVocabulary;
    use crate::config::{DeviceConfig, PortConfig};
    use crate::device::testing::FakeProtocol;
    use crate::event::NoopSink;

    use super::*;

    fn device(protocol: FakeProtocol) -> Device<FakeProtocol> {
        let config = DeviceConfig::new("10.0.0.2".parse().unwrap(), "garage")
            .with_port(0, PortConfig::input())
            .with_port(1, PortConfig::output());
        Device::new(
            &config,
            protocol,
            Arc::new(CommandVocabulary::default()),
            Arc::new(NoopSink),
        )
    }

    #[tokio::test]
    async fn output_turn_on_sends_switch_and_updates_state() {
        let device = device(FakeProtocol::with_statuses("off;off"));

        device.turn_on(1).await.unwrap();

        assert_eq!(device.protocol.requests(), vec!["?cmd=1:1"]);
        assert_eq!(device.port(1).unwrap().state(), Some(PortState::On));
    }

    #[tokio::test]
    async fn output_failure_leaves_state_untouched() {
        let device = device(FakeProtocol::default());

        let err = device.turn_on(1).await.unwrap_err();

        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(device.port(1).unwrap().state(), None);
    }

    #[tokio::test]
    async fn input_turn_on_runs_default_action_then_reads_off() {
        let protocol = FakeProtocol::with_statuses("on;off");
        *protocol.reply.lock() = Some("Done".to_string());
        let device = device(protocol);

        device.turn_on(0).await.unwrap();

        assert_eq!(device.protocol.requests(), vec!["?pt=0&cmd=d", "?cmd=all"]);
        assert_eq!(device.port(0).unwrap().state(), Some(PortState::Off));
    }

    #[tokio::test]
    async fn input_turn_off_is_local() {
        let device = device(FakeProtocol::default());
        device.set_port_status("on", Some(0), None);

        device.turn_off(0).await.unwrap();

        assert!(device.protocol.requests().is_empty());
        assert_eq!(device.port(0).unwrap().state(), Some(PortState::Off));
    }

    #[tokio::test]
    async fn toggle_flips_output() {
        let device = device(FakeProtocol::with_statuses("off;off"));

        device.toggle(1).await.unwrap();
        assert!(device.port(1).unwrap().is_on());

        device.toggle(1).await.unwrap();
        assert!(!device.port(1).unwrap().is_on());
        assert_eq!(device.protocol.requests(), vec!["?cmd=1:1", "?cmd=1:0"]);
    }

    #[tokio::test]
    async fn undeclared_port_is_an_error() {
        let device = device(FakeProtocol::default());
        let err = device.turn_on(9).await.unwrap_err();
        assert!(matches!(err, Error::PortNotFound { index: 9, .. }));
    }
}

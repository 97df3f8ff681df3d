// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The notification sink capability and its simple implementations.

use crate::port::Port;

use super::PortParams;

/// Receives port state changes.
///
/// Implementations are called synchronously from the task that applied the
/// change, after the port's own lock has been released. They must not block.
pub trait NotificationSink: Send + Sync {
    /// Called once per actual state change of `port`.
    fn notify(&self, port: &Port, params: PortParams);
}

impl<F> NotificationSink for F
where
    F: Fn(&Port, PortParams) + Send + Sync,
{
    fn notify(&self, port: &Port, params: PortParams) {
        self(port, params);
    }
}

/// A sink that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _port: &Port, _params: PortParams) {}
}

/// A sink that logs every change at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, port: &Port, params: PortParams) {
        tracing::info!(
            ip = %port.device_ip(),
            device = %port.device_name(),
            port = port.index(),
            kind = %port.kind(),
            state = %params.state,
            count = ?params.count,
            "Port state changed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::types::{PortKind, PortState};

    fn port_with(sink: Arc<dyn NotificationSink>) -> Port {
        Port::new(
            "10.0.0.5".parse().unwrap(),
            Arc::from("hall"),
            3,
            PortKind::Input,
            None,
            sink,
        )
    }

    #[test]
    fn closure_is_a_sink() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let sink: Arc<dyn NotificationSink> = Arc::new(move |port: &Port, params: PortParams| {
            assert_eq!(port.index(), 3);
            assert_eq!(params.state, PortState::On);
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        let port = port_with(sink);
        port.set_state(PortState::On);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_and_log_sinks_accept_changes() {
        let port = port_with(Arc::new(NoopSink));
        assert!(port.set_state(PortState::On));

        let port = port_with(Arc::new(LogSink));
        assert!(port.set_state(PortState::Off));
    }
}

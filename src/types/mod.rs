// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for `MegaD` port control.
//!
//! # Types
//!
//! - [`PortState`] - On/Off state of a port
//! - [`PortKind`] - Declared input or output kind
//! - [`PortStatus`] - One parsed status token (`STATE` or `STATE/COUNT`)

mod port_state;

pub use port_state::{PortKind, PortState, PortStatus};

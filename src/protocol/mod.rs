// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound protocol for sending commands to `MegaD` controllers.
//!
//! Controllers accept a plain HTTP GET of
//! `http://{ip}/{password}/?{query}` and answer with a short text body.
//! [`HttpClient`] implements this; the [`Protocol`] trait is the seam a
//! [`Device`](crate::device::Device) talks through.

mod http;

pub use http::{HttpClient, HttpConfig};

use std::future::Future;

use crate::error::ProtocolError;

/// Response body of one outbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    body: String,
}

impl CommandResponse {
    /// Creates a new command response with the given body.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Returns the raw response body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consumes the response, returning the body.
    #[must_use]
    pub fn into_body(self) -> String {
        self.body
    }
}

/// Transport that delivers an encoded query to one device.
pub trait Protocol: Send + Sync + 'static {
    /// Sends an encoded query (starting with `?`) and returns the response
    /// body.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request fails or times out.
    fn send_raw(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<CommandResponse, ProtocolError>> + Send;
}

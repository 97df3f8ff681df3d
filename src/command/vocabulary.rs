// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Symbolic command vocabulary for a controller firmware family.

use serde::{Deserialize, Serialize};

use super::QueryArgs;

/// Maps the symbolic commands the library needs to the literal wire tokens
/// of one firmware family.
///
/// Every field falls back to the token used by stock `MegaD-328` firmware,
/// so a configuration only has to list the tokens that differ.
///
/// # Examples
///
/// ```
/// use megad_lib::command::CommandVocabulary;
///
/// let vocab = CommandVocabulary::default();
/// assert_eq!(vocab.fetch_all_command().encode(), "?cmd=all");
/// assert_eq!(vocab.output_command(7, true).encode(), "?cmd=7:1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandVocabulary {
    /// Inbound key carrying the `;`-delimited status of every port.
    pub all: String,
    /// Key carrying a port index (inbound push and default action).
    pub port_update: String,
    /// Inbound key hinting that the pushed port went off.
    pub port_off: String,
    /// Outbound command key.
    pub cmd: String,
    /// Value of `cmd` requesting the status of every port.
    pub fetch_all: String,
    /// Value of `cmd` that runs an input's configured default action.
    pub do_default: String,
    /// Response body acknowledging a default action.
    pub done: String,
    /// Literal switching an output on.
    pub on: String,
    /// Literal switching an output off.
    pub off: String,
    /// Separator between port index and on/off literal.
    pub port_separator: String,
}

impl Default for CommandVocabulary {
    fn default() -> Self {
        Self {
            all: "all".to_string(),
            port_update: "pt".to_string(),
            port_off: "m".to_string(),
            cmd: "cmd".to_string(),
            fetch_all: "all".to_string(),
            do_default: "d".to_string(),
            done: "Done".to_string(),
            on: "1".to_string(),
            off: "0".to_string(),
            port_separator: ":".to_string(),
        }
    }
}

impl CommandVocabulary {
    /// Command requesting the status of every port.
    #[must_use]
    pub fn fetch_all_command(&self) -> QueryArgs {
        QueryArgs::new().arg(&self.cmd, &self.fetch_all)
    }

    /// Command switching an output port.
    #[must_use]
    pub fn output_command(&self, index: u16, on: bool) -> QueryArgs {
        let literal = if on { &self.on } else { &self.off };
        QueryArgs::new().arg(
            &self.cmd,
            format!("{index}{}{literal}", self.port_separator),
        )
    }

    /// Command running the default action bound to an input port.
    #[must_use]
    pub fn default_action_command(&self, index: u16) -> QueryArgs {
        QueryArgs::new()
            .arg(&self.port_update, index)
            .arg(&self.cmd, &self.do_default)
    }

    /// Returns `true` if the device may change other ports while executing
    /// `args`, so every port must be re-read afterwards.
    #[must_use]
    pub fn triggers_refresh(&self, args: &QueryArgs) -> bool {
        args.mentions(&self.do_default) || args.mentions(&self.port_update)
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lutron Integration Protocol transport.
//!
//! The layers, from the socket up:
//!
//! - [`LipCodec`]: splits the telnet byte stream into lines and prompts
//! - [`Session`]: runs the login handshake over any byte stream
//! - [`Connection`]: keeps one authenticated TCP session alive and
//!   reconnects when it fails
//! - [`Correlator`]: serialises commands and keep-alive probes and matches
//!   each to its reply, fanning every inbound line out to a
//!   [`NotificationHandler`] first
//!
//! [`HubMessage`] is the typed view of inbound lines shared by all of them.

mod codec;
mod connection;
mod correlator;
mod message;
mod reply;
mod session;

pub use codec::{DEFAULT_PROMPTS, Frame, LINE_TERMINATOR, LipCodec, PromptKind, PromptPattern};
pub use connection::{Connection, ConnectionState, LinkEvent};
pub use correlator::{CommandExecutor, Correlator, NotificationHandler};
pub use message::{ButtonAction, ButtonEvent, HubMessage};
pub use reply::ReplyMatcher;
pub use session::{Credentials, DEFAULT_PASSWORD, DEFAULT_USERNAME, LOGIN_REJECTIONS, Session};

use std::time::Duration;

/// Converts a duration to whole milliseconds for error values and logs.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

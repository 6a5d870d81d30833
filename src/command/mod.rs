// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lutron Integration Protocol command definitions.
//!
//! Every LIP command is a single line made of an operation character, a
//! command name and comma-separated parameters:
//!
//! | Operation | Meaning | Example |
//! |-----------|---------|---------|
//! | `#` | Execute | `#OUTPUT,25,1,50,1800` |
//! | `?` | Query | `?OUTPUT,25,1` |
//!
//! The hub answers with `~` lines (`~OUTPUT,25,1,50.00`), which are also
//! pushed unsolicited whenever a zone changes.
//!
//! # Examples
//!
//! ```
//! use lipfade::command::{Command, OutputCommand};
//! use lipfade::types::{Brightness, FadeDuration, ZoneId};
//!
//! let zone = ZoneId::new(34).unwrap();
//! let cmd = OutputCommand::set_level(zone, Brightness::OFF, FadeDuration::from_seconds(30));
//! assert_eq!(cmd.name(), "OUTPUT");
//! assert_eq!(cmd.to_line(), "#OUTPUT,34,1,0,30");
//! ```

mod output;

pub use output::{ACTION_LEVEL, OutputCommand};

use crate::protocol::ReplyMatcher;

/// The leading operation character of a LIP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `#` - perform an action.
    Execute,
    /// `?` - ask for the current value.
    Query,
}

impl Operation {
    /// Returns the wire character.
    #[must_use]
    pub const fn as_char(&self) -> char {
        match self {
            Self::Execute => '#',
            Self::Query => '?',
        }
    }
}

/// A command that can be sent to the hub.
pub trait Command {
    /// Returns the operation of this command.
    fn operation(&self) -> Operation;

    /// Returns the command name, for example `"OUTPUT"`.
    fn name(&self) -> &'static str;

    /// Returns the comma-separated parameters.
    fn parameters(&self) -> Vec<String>;

    /// Returns how the reply to this command is recognised.
    fn reply_matcher(&self) -> ReplyMatcher;

    /// Returns the full line to write, without terminator.
    fn to_line(&self) -> String {
        let mut line = String::new();
        line.push(self.operation().as_char());
        line.push_str(self.name());
        for param in self.parameters() {
            line.push(',');
            line.push_str(&param);
        }
        line
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zone output commands.
//!
//! Only action 1 (set/get output level) is implemented; it is all the fade
//! engine needs.

use crate::command::{Command, Operation};
use crate::protocol::ReplyMatcher;
use crate::types::{Brightness, FadeDuration, ZoneId};

/// LIP action number for "output level".
pub const ACTION_LEVEL: u8 = 1;

/// Command addressing a zone output.
///
/// # Examples
///
/// ```
/// use lipfade::command::{Command, OutputCommand};
/// use lipfade::types::{Brightness, FadeDuration, ZoneId};
///
/// let zone = ZoneId::new(25).unwrap();
///
/// // Fade to 50% over 30 minutes
/// let cmd = OutputCommand::set_level(zone, Brightness::new(50).unwrap(), FadeDuration::from_minutes(30));
/// assert_eq!(cmd.to_line(), "#OUTPUT,25,1,50,1800");
///
/// // Query the current level
/// let query = OutputCommand::QueryLevel { zone };
/// assert_eq!(query.to_line(), "?OUTPUT,25,1");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCommand {
    /// Set the output level with a native fade and optional delay.
    SetLevel {
        /// Target zone.
        zone: ZoneId,
        /// Target level.
        level: Brightness,
        /// Native fade time.
        fade: FadeDuration,
        /// Delay before the fade starts.
        delay: FadeDuration,
    },
    /// Query the current output level.
    QueryLevel {
        /// Target zone.
        zone: ZoneId,
    },
}

impl OutputCommand {
    /// Creates a set-level command without delay.
    #[must_use]
    pub const fn set_level(zone: ZoneId, level: Brightness, fade: FadeDuration) -> Self {
        Self::SetLevel {
            zone,
            level,
            fade,
            delay: FadeDuration::IMMEDIATE,
        }
    }

    /// Creates a command that holds the zone at `level` immediately.
    #[must_use]
    pub const fn hold(zone: ZoneId, level: Brightness) -> Self {
        Self::set_level(zone, level, FadeDuration::IMMEDIATE)
    }

    /// Returns the zone this command addresses.
    #[must_use]
    pub const fn zone(&self) -> ZoneId {
        match self {
            Self::SetLevel { zone, .. } | Self::QueryLevel { zone } => *zone,
        }
    }
}

impl Command for OutputCommand {
    fn operation(&self) -> Operation {
        match self {
            Self::SetLevel { .. } => Operation::Execute,
            Self::QueryLevel { .. } => Operation::Query,
        }
    }

    fn name(&self) -> &'static str {
        "OUTPUT"
    }

    fn parameters(&self) -> Vec<String> {
        match self {
            Self::SetLevel {
                zone,
                level,
                fade,
                delay,
            } => {
                let mut params = vec![
                    zone.to_string(),
                    ACTION_LEVEL.to_string(),
                    level.value().to_string(),
                    fade.seconds().to_string(),
                ];
                // Hubs without delay support reject a sixth field, so only send it when used
                if !delay.is_immediate() {
                    params.push(delay.seconds().to_string());
                }
                params
            }
            Self::QueryLevel { zone } => vec![zone.to_string(), ACTION_LEVEL.to_string()],
        }
    }

    fn reply_matcher(&self) -> ReplyMatcher {
        ReplyMatcher::output_level(self.zone())
    }
}

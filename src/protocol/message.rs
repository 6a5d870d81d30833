// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed view of inbound hub lines.
//!
//! Only the monitoring lines this library acts on are decoded:
//!
//! - `~OUTPUT,<zone>,1,<level>` - zone level report or push
//! - `~DEVICE,<id>,<component>,<action>` - keypad button activity
//! - `~ERROR,<code>` - rejection of the last command
//!
//! Everything else is kept verbatim as [`HubMessage::Other`].

use serde::{Deserialize, Serialize};

use crate::command::ACTION_LEVEL;
use crate::error::{HubErrorCode, ParseError};
use crate::types::{Brightness, ZoneId};

/// Keypad button actions reported in `~DEVICE` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonAction {
    /// 3 - button pressed
    Press,
    /// 4 - button released
    Release,
    /// 5 - button held
    Hold,
    /// 6 - double tap
    DoubleTap,
    /// 32 - release after hold
    HoldRelease,
    /// Any action this library does not name.
    Other(u16),
}

impl ButtonAction {
    /// Maps the numeric action from a `~DEVICE` line.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            3 => Self::Press,
            4 => Self::Release,
            5 => Self::Hold,
            6 => Self::DoubleTap,
            32 => Self::HoldRelease,
            other => Self::Other(other),
        }
    }
}

/// A button event from a keypad or Pico remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonEvent {
    /// Integration id of the device.
    pub device: u32,
    /// Component (button) number on the device.
    pub component: u32,
    /// What happened to the button.
    pub action: ButtonAction,
}

/// A decoded inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// A zone reported its current output level.
    OutputLevel {
        /// The zone.
        zone: ZoneId,
        /// Reported level, rounded to whole percent.
        level: Brightness,
    },

    /// Keypad button activity.
    Button(ButtonEvent),

    /// The hub rejected the last command.
    Error(HubErrorCode),

    /// Any other line, kept verbatim.
    Other(String),
}

impl HubMessage {
    /// Decodes one inbound line.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` when a line has a recognised prefix but
    /// malformed fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use lipfade::protocol::HubMessage;
    ///
    /// let msg = HubMessage::parse("~OUTPUT,25,1,75.00").unwrap();
    /// assert!(matches!(msg, HubMessage::OutputLevel { .. }));
    /// ```
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let Some(body) = line.strip_prefix('~') else {
            return Ok(Self::Other(line.to_string()));
        };

        let fields: Vec<&str> = body.split(',').map(str::trim).collect();
        match fields.first().copied() {
            Some("OUTPUT") => parse_output(line, &fields),
            Some("DEVICE") => parse_device(&fields),
            Some("ERROR") => {
                let code = parse_number::<u16>(&fields, 1, "error code")?;
                Ok(Self::Error(HubErrorCode::from_code(code)))
            }
            _ => Ok(Self::Other(line.to_string())),
        }
    }

    /// Returns the zone this message is about, if any.
    #[must_use]
    pub fn zone(&self) -> Option<ZoneId> {
        match self {
            Self::OutputLevel { zone, .. } => Some(*zone),
            _ => None,
        }
    }
}

fn parse_output(line: &str, fields: &[&str]) -> Result<HubMessage, ParseError> {
    let zone_raw = parse_number::<u32>(fields, 1, "zone")?;
    let zone = ZoneId::new(zone_raw).map_err(|e| ParseError::InvalidValue {
        field: "zone".to_string(),
        message: e.to_string(),
    })?;
    let action = parse_number::<u8>(fields, 2, "action")?;
    if action != ACTION_LEVEL {
        // Other output actions (raise/lower/flash) carry no level
        return Ok(HubMessage::Other(line.to_string()));
    }
    let raw_level = parse_number::<f32>(fields, 3, "level")?;
    let level = Brightness::from_level(raw_level).map_err(|e| ParseError::InvalidValue {
        field: "level".to_string(),
        message: e.to_string(),
    })?;
    Ok(HubMessage::OutputLevel { zone, level })
}

fn parse_device(fields: &[&str]) -> Result<HubMessage, ParseError> {
    let device = parse_number::<u32>(fields, 1, "device")?;
    let component = parse_number::<u32>(fields, 2, "component")?;
    let action = parse_number::<u16>(fields, 3, "action")?;
    Ok(HubMessage::Button(ButtonEvent {
        device,
        component,
        action: ButtonAction::from_code(action),
    }))
}

fn parse_number<T>(fields: &[&str], index: usize, name: &str) -> Result<T, ParseError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = fields
        .get(index)
        .ok_or_else(|| ParseError::MissingField(name.to_string()))?;
    raw.parse::<T>().map_err(|e| ParseError::InvalidValue {
        field: name.to_string(),
        message: e.to_string(),
    })
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Brightness type for zone output levels.
//!
//! This module provides a type-safe representation of output levels,
//! ensuring values are always within the valid range of 0-100%.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Output level as a whole percentage (0-100).
///
/// The hub reports levels with two decimals (`75.00`); this library works in
/// whole percent and rounds incoming values to the nearest integer.
///
/// # Examples
///
/// ```
/// use lipfade::types::Brightness;
///
/// let level = Brightness::new(75).unwrap();
/// assert_eq!(level.value(), 75);
///
/// assert_eq!(Brightness::OFF.value(), 0);
/// assert_eq!(Brightness::FULL.value(), 100);
///
/// assert!(Brightness::new(101).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Brightness(u8);

impl Brightness {
    /// Output off (0%).
    pub const OFF: Self = Self(0);

    /// Full output (100%).
    pub const FULL: Self = Self(100);

    /// Creates a new brightness value.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: u32::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Creates a brightness value, clamping to the valid range.
    #[must_use]
    pub const fn clamped(value: u8) -> Self {
        if value > 100 { Self(100) } else { Self(value) }
    }

    /// Returns the percentage value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns true when the output is off.
    #[must_use]
    pub const fn is_off(&self) -> bool {
        self.0 == 0
    }

    /// Converts a level reported by the hub (`0.00`-`100.00`).
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` for values outside 0-100 or NaN.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_level(level: f32) -> Result<Self, ValueError> {
        if !(0.0..=100.0).contains(&level) {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                // Informational only, the value is already out of range
                actual: level.max(0.0) as u32,
            });
        }
        Ok(Self(level.round() as u8))
    }

    /// Converts from the host's 0-255 brightness scale.
    ///
    /// Truncates like the host light layer does, so 255 maps to 100 and
    /// 128 maps to 50.
    ///
    /// ```
    /// use lipfade::types::Brightness;
    ///
    /// assert_eq!(Brightness::from_byte_scale(255).value(), 100);
    /// assert_eq!(Brightness::from_byte_scale(128).value(), 50);
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_byte_scale(value: u8) -> Self {
        Self((u32::from(value) * 100 / 255) as u8)
    }

    /// Converts to the host's 0-255 brightness scale.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_byte_scale(&self) -> u8 {
        ((u32::from(self.0) * 255 + 50) / 100) as u8
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for Brightness {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Brightness> for u8 {
    fn from(value: Brightness) -> Self {
        value.0
    }
}

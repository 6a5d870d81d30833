// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fade duration type for brightness transitions.
//!
//! Fade requests are expressed in whole seconds. Zero means an immediate
//! snap to the target level.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Length of a brightness transition, in whole seconds.
///
/// Unlike a native hub fade, a requested fade may be arbitrarily long; the
/// [`fade`](crate::fade) module splits it into hub-sized pieces.
///
/// # Examples
///
/// ```
/// use lipfade::types::FadeDuration;
///
/// let d = FadeDuration::from_minutes(90);
/// assert_eq!(d.seconds(), 5400);
///
/// let parsed: FadeDuration = "2:30:00".parse().unwrap();
/// assert_eq!(parsed.seconds(), 9000);
///
/// assert!(FadeDuration::IMMEDIATE.is_immediate());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FadeDuration(u32);

impl FadeDuration {
    /// An immediate snap with no fade.
    pub const IMMEDIATE: Self = Self(0);

    /// Creates a fade duration from seconds.
    #[must_use]
    pub const fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    /// Creates a fade duration from minutes.
    #[must_use]
    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes.saturating_mul(60))
    }

    /// Returns the duration in seconds.
    #[must_use]
    pub const fn seconds(&self) -> u32 {
        self.0
    }

    /// Returns true for a zero-length fade.
    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        self.0 == 0
    }

    /// Converts to a standard [`Duration`].
    #[must_use]
    pub const fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0 as u64)
    }
}

impl fmt::Display for FadeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl From<u32> for FadeDuration {
    fn from(seconds: u32) -> Self {
        Self(seconds)
    }
}

/// Parses `SS`, `MM:SS` or `HH:MM:SS`.
impl FromStr for FadeDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(ParseError::UnexpectedFormat(s.to_string()));
        }

        let mut total: u32 = 0;
        for (i, part) in parts.iter().enumerate() {
            let value = part.parse::<u32>().map_err(|e| ParseError::InvalidValue {
                field: "fade duration".to_string(),
                message: e.to_string(),
            })?;
            // Leading field is unbounded; minutes and seconds stay below 60
            if i > 0 && value >= 60 {
                return Err(ParseError::InvalidValue {
                    field: "fade duration".to_string(),
                    message: format!("component {value} must be below 60"),
                });
            }
            total = total
                .checked_mul(60)
                .and_then(|t| t.checked_add(value))
                .ok_or_else(|| ParseError::InvalidValue {
                    field: "fade duration".to_string(),
                    message: "overflow".to_string(),
                })?;
        }
        Ok(Self(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_formats() {
        assert_eq!("45".parse::<FadeDuration>().unwrap().seconds(), 45);
        assert_eq!("30:00".parse::<FadeDuration>().unwrap().seconds(), 1800);
        assert_eq!("2:00:00".parse::<FadeDuration>().unwrap().seconds(), 7200);
    }

    #[test]
    fn rejects_bad_components() {
        assert!("1:75".parse::<FadeDuration>().is_err());
        assert!("a:00".parse::<FadeDuration>().is_err());
        assert!("1:2:3:4".parse::<FadeDuration>().is_err());
        assert!("".parse::<FadeDuration>().is_err());
    }

    #[test]
    fn converts_to_std_duration() {
        assert_eq!(
            FadeDuration::from_seconds(90).as_duration(),
            Duration::from_secs(90)
        );
    }
}

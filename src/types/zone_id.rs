// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zone integration identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Integration id of a lighting zone, as assigned by the hub.
///
/// Ids are positive integers and stable for the lifetime of the hub's
/// configuration.
///
/// # Examples
///
/// ```
/// use lipfade::types::ZoneId;
///
/// let zone: ZoneId = "28".parse().unwrap();
/// assert_eq!(zone.value(), 28);
/// assert!(ZoneId::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ZoneId(u32);

impl ZoneId {
    /// Creates a zone id.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidZoneId` for zero.
    pub fn new(id: u32) -> Result<Self, ValueError> {
        if id == 0 {
            return Err(ValueError::InvalidZoneId);
        }
        Ok(Self(id))
    }

    /// Returns the raw integration id.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ZoneId {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<u32>()
            .map_err(|_| ValueError::InvalidZoneId)?;
        Self::new(id)
    }
}

impl TryFrom<u32> for ZoneId {
    type Error = ValueError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ZoneId> for u32 {
    fn from(value: ZoneId) -> Self {
        value.0
    }
}

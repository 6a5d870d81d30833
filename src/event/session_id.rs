// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fade session identifier type.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a fade session.
///
/// # Examples
///
/// ```
/// use lipfade::event::FadeSessionId;
///
/// let a = FadeSessionId::new();
/// let b = FadeSessionId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FadeSessionId(Uuid);

impl FadeSessionId {
    /// Creates a new random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FadeSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FadeSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = self.0.to_string();
        write!(f, "FadeSessionId({}...)", &full[..8])
    }
}

impl fmt::Display for FadeSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for FadeSessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_shortened() {
        let id = FadeSessionId::from(Uuid::nil());
        assert_eq!(format!("{id:?}"), "FadeSessionId(00000000...)");
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }
}

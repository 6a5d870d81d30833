// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub event types.

use crate::error::ProtocolError;
use crate::protocol::{ButtonEvent, ConnectionState};
use crate::types::{Brightness, FadeDuration, ZoneId};

use super::FadeSessionId;

/// Events emitted by a [`Hub`](crate::Hub).
///
/// Each fade session ends with exactly one of `FadeCompleted`,
/// `FadeFailed`, `FadeSuperseded` or `FadeCancelled`.
///
/// # Examples
///
/// ```
/// use lipfade::event::HubEvent;
/// use lipfade::types::{Brightness, ZoneId};
///
/// let event = HubEvent::ZoneLevelChanged {
///     zone: ZoneId::new(28).unwrap(),
///     level: Brightness::new(40).unwrap(),
///     previous: None,
/// };
/// assert_eq!(event.zone(), ZoneId::new(28).ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// The connection changed state.
    ConnectionChanged {
        /// The new state.
        state: ConnectionState,
    },

    /// A zone reported or reached a new level.
    ZoneLevelChanged {
        /// The zone.
        zone: ZoneId,
        /// Its new level.
        level: Brightness,
        /// The level known before, if any.
        previous: Option<Brightness>,
    },

    /// A fade session started.
    FadeStarted {
        /// The session.
        session: FadeSessionId,
        /// The zone being faded.
        zone: ZoneId,
        /// Target level.
        target: Brightness,
        /// Requested duration.
        duration: FadeDuration,
    },

    /// A fade session reached its target.
    FadeCompleted {
        /// The session.
        session: FadeSessionId,
        /// The zone.
        zone: ZoneId,
        /// The level the zone was faded to.
        level: Brightness,
    },

    /// A fade session stopped because a command failed.
    FadeFailed {
        /// The session.
        session: FadeSessionId,
        /// The zone.
        zone: ZoneId,
        /// Why the command failed.
        error: ProtocolError,
    },

    /// A fade session was replaced by a newer request for the same zone.
    FadeSuperseded {
        /// The replaced session.
        session: FadeSessionId,
        /// The zone.
        zone: ZoneId,
        /// The session that replaced it.
        by: FadeSessionId,
    },

    /// A fade session was cancelled.
    FadeCancelled {
        /// The session.
        session: FadeSessionId,
        /// The zone.
        zone: ZoneId,
    },

    /// A keypad button was used.
    ButtonPressed(ButtonEvent),
}

impl HubEvent {
    /// Returns the zone this event is about, if any.
    #[must_use]
    pub fn zone(&self) -> Option<ZoneId> {
        match self {
            Self::ZoneLevelChanged { zone, .. }
            | Self::FadeStarted { zone, .. }
            | Self::FadeCompleted { zone, .. }
            | Self::FadeFailed { zone, .. }
            | Self::FadeSuperseded { zone, .. }
            | Self::FadeCancelled { zone, .. } => Some(*zone),
            Self::ConnectionChanged { .. } | Self::ButtonPressed(_) => None,
        }
    }

    /// Returns the fade session this event is about, if any.
    #[must_use]
    pub fn session(&self) -> Option<FadeSessionId> {
        match self {
            Self::FadeStarted { session, .. }
            | Self::FadeCompleted { session, .. }
            | Self::FadeFailed { session, .. }
            | Self::FadeSuperseded { session, .. }
            | Self::FadeCancelled { session, .. } => Some(*session),
            _ => None,
        }
    }

    /// Returns `true` if this event ends a fade session.
    #[must_use]
    pub fn is_fade_terminal(&self) -> bool {
        matches!(
            self,
            Self::FadeCompleted { .. }
                | Self::FadeFailed { .. }
                | Self::FadeSuperseded { .. }
                | Self::FadeCancelled { .. }
        )
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fade session state and the caller's handle to it.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ProtocolError;
use crate::event::FadeSessionId;
use crate::fade::FadePlan;
use crate::fade::plan::interpolate;
use crate::protocol::duration_millis;
use crate::types::{Brightness, FadeDuration, ZoneId};

/// Lifecycle of a fade session.
///
/// ```text
/// Pending -> Running -> Completed
///    \          \----> Superseded | Cancelled | Failed
///     \--------------> Superseded | Cancelled | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FadeState {
    /// Accepted, no command sent yet.
    Pending,
    /// At least one native command is being issued or running.
    Running,
    /// The final step elapsed.
    Completed,
    /// Replaced by a newer request for the same zone.
    Superseded,
    /// Stopped by a cancel request or shutdown.
    Cancelled,
    /// A command failed.
    Failed,
}

impl FadeState {
    /// Returns `true` for states a session never leaves.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for FadeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Superseded => "superseded",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Snapshot of a fade session.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeSession {
    /// Session id.
    pub id: FadeSessionId,
    /// The zone being faded.
    pub zone: ZoneId,
    /// Level at the start; `None` until known.
    pub start: Option<Brightness>,
    /// Target level.
    pub target: Brightness,
    /// Requested duration.
    pub duration: FadeDuration,
    /// Planned native commands; `None` until the session runs.
    pub plan: Option<FadePlan>,
    /// Native commands acknowledged by the hub so far.
    pub issued: u32,
    /// When the hub acknowledged the latest command.
    pub step_started: Option<Instant>,
    /// Current state.
    pub state: FadeState,
    /// When the fade was requested.
    pub requested_at: DateTime<Utc>,
    /// The error that failed the session.
    pub error: Option<ProtocolError>,
}

impl FadeSession {
    pub(crate) fn new(
        zone: ZoneId,
        start: Option<Brightness>,
        target: Brightness,
        duration: FadeDuration,
    ) -> Self {
        Self {
            id: FadeSessionId::new(),
            zone,
            start,
            target,
            duration,
            plan: None,
            issued: 0,
            step_started: None,
            state: FadeState::Pending,
            requested_at: Utc::now(),
            error: None,
        }
    }

    /// Estimates the zone's level at `now` from the acknowledged commands.
    ///
    /// The hub fades linearly, so the level inside the running command is
    /// interpolated between that command's start and end levels. Returns
    /// `None` when the start level was never known.
    #[must_use]
    pub fn level_at(&self, now: Instant) -> Option<Brightness> {
        let start = self.start?;
        let Some(plan) = &self.plan else {
            return Some(start);
        };
        let Some(index) = self.issued.checked_sub(1) else {
            return Some(plan.start());
        };
        let step = plan.step(index)?;
        let from = plan.level_before(index);
        let Some(started) = self.step_started else {
            return Some(from);
        };

        let fade = step.fade.as_duration();
        let elapsed = now.saturating_duration_since(started).min(fade);
        Some(interpolate(
            from,
            step.level,
            duration_millis(elapsed),
            duration_millis(fade),
        ))
    }
}

/// Caller's view of a requested fade.
///
/// Dropping the handle does not stop the fade.
#[derive(Debug, Clone)]
pub struct FadeHandle {
    id: FadeSessionId,
    zone: ZoneId,
    status: watch::Receiver<FadeSession>,
}

impl FadeHandle {
    pub(crate) fn new(status: watch::Receiver<FadeSession>) -> Self {
        let (id, zone) = {
            let session = status.borrow();
            (session.id, session.zone)
        };
        Self { id, zone, status }
    }

    /// Returns the session id.
    #[must_use]
    pub fn id(&self) -> FadeSessionId {
        self.id
    }

    /// Returns the zone being faded.
    #[must_use]
    pub fn zone(&self) -> ZoneId {
        self.zone
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> FadeState {
        self.status.borrow().state
    }

    /// Returns a snapshot of the session.
    #[must_use]
    pub fn snapshot(&self) -> FadeSession {
        self.status.borrow().clone()
    }

    /// Waits until the session reaches a terminal state and returns it.
    pub async fn finished(&self) -> FadeState {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|session| session.state.is_terminal())
            .await
            .map(|session| session.state);
        // The scheduler sets a terminal state before dropping the sender
        reached.unwrap_or_else(|_| status.borrow().state)
    }
}

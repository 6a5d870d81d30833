// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-zone fade sessions driven over a [`CommandExecutor`].
//!
//! Every accepted request becomes a session with its own task. The task
//! issues the plan's native commands one at a time and sleeps for each
//! command's fade time, since the fade itself runs on the hub's clock.
//!
//! A zone has at most one live session. The table of live sessions is the
//! only place a session can leave that table, and a session reaches its
//! terminal state exactly when it is removed, so each session ends once and
//! emits one terminal event.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::command::OutputCommand;
use crate::error::ProtocolError;
use crate::event::{EventBus, FadeSessionId, HubEvent};
use crate::fade::{FadeHandle, FadePlan, FadeSession, FadeState};
use crate::protocol::{CommandExecutor, HubMessage};
use crate::types::{Brightness, FadeDuration, ZoneId};
use crate::zone::ZoneRegistry;

struct LiveSession {
    id: FadeSessionId,
    token: CancellationToken,
    status: Arc<watch::Sender<FadeSession>>,
}

struct Inner<E> {
    executor: E,
    zones: Arc<ZoneRegistry>,
    events: EventBus,
    cap: FadeDuration,
    live: parking_lot::Mutex<HashMap<ZoneId, LiveSession>>,
}

impl<E> Inner<E> {
    /// Ends the live session of `zone` if it is `id` (or any session when
    /// `id` is `None`). Returns the final snapshot of the session that
    /// ended.
    fn finish(
        &self,
        zone: ZoneId,
        id: Option<FadeSessionId>,
        state: FadeState,
        error: Option<ProtocolError>,
    ) -> Option<FadeSession> {
        let mut live = self.live.lock();
        if id.is_some_and(|id| live.get(&zone).is_none_or(|s| s.id != id)) {
            return None;
        }
        let session = live.remove(&zone)?;
        self.zones.set_active_fade(zone, None);
        session.token.cancel();
        session.status.send_modify(|s| {
            s.state = state;
            s.error = error;
        });
        let snapshot = session.status.borrow().clone();
        Some(snapshot)
    }

    fn mark_running(
        &self,
        zone: ZoneId,
        id: FadeSessionId,
        start: Option<Brightness>,
        plan: &FadePlan,
    ) -> bool {
        let live = self.live.lock();
        match live.get(&zone) {
            Some(session) if session.id == id => {
                session.status.send_modify(|s| {
                    s.state = FadeState::Running;
                    s.start = start;
                    s.plan = Some(plan.clone());
                });
                true
            }
            _ => false,
        }
    }

    fn fail(&self, zone: ZoneId, id: FadeSessionId, error: ProtocolError) {
        if let Some(FadeSession { id: session, .. }) =
            self.finish(zone, Some(id), FadeState::Failed, Some(error.clone()))
        {
            tracing::warn!(%zone, %session, %error, "fade failed");
            self.events.publish(HubEvent::FadeFailed {
                session,
                zone,
                error,
            });
        }
    }

    fn complete(&self, zone: ZoneId, id: FadeSessionId, target: Brightness) {
        if let Some(FadeSession { id: session, .. }) =
            self.finish(zone, Some(id), FadeState::Completed, None)
        {
            tracing::info!(%zone, %session, level = %target, "fade completed");
            let previous = self.zones.set_brightness(zone, target);
            if previous != Some(target) {
                self.events.publish(HubEvent::ZoneLevelChanged {
                    zone,
                    level: target,
                    previous,
                });
            }
            self.events.publish(HubEvent::FadeCompleted {
                session,
                zone,
                level: target,
            });
        }
    }
}

/// Runs long fades as sequences of native hub fades.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use lipfade::event::EventBus;
/// use lipfade::fade::{FadeScheduler, FadeState};
/// use lipfade::protocol::CommandExecutor;
/// use lipfade::types::{Brightness, FadeDuration, ZoneId};
/// use lipfade::zone::ZoneRegistry;
///
/// # async fn example<E: CommandExecutor>(executor: E) {
/// let scheduler = FadeScheduler::new(
///     executor,
///     Arc::new(ZoneRegistry::new()),
///     EventBus::new(),
///     FadeDuration::from_seconds(7200),
/// );
///
/// let zone = ZoneId::new(28).unwrap();
/// let handle = scheduler.request_fade(zone, Brightness::OFF, FadeDuration::from_minutes(150));
/// assert_eq!(handle.finished().await, FadeState::Completed);
/// # }
/// ```
pub struct FadeScheduler<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for FadeScheduler<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: CommandExecutor> FadeScheduler<E> {
    /// Creates a scheduler.
    ///
    /// `cap` is the longest fade a single command may carry.
    #[must_use]
    pub fn new(executor: E, zones: Arc<ZoneRegistry>, events: EventBus, cap: FadeDuration) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                zones,
                events,
                cap,
                live: parking_lot::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the longest fade a single command may carry.
    #[must_use]
    pub fn cap(&self) -> FadeDuration {
        self.inner.cap
    }

    /// Starts fading `zone` to `target` over `duration`.
    ///
    /// Any live session of the zone is superseded first and sends nothing
    /// further. Must be called within a tokio runtime.
    pub fn request_fade(
        &self,
        zone: ZoneId,
        target: Brightness,
        duration: FadeDuration,
    ) -> FadeHandle {
        let inner = &self.inner;
        let session = FadeSession::new(zone, inner.zones.brightness(zone), target, duration);
        let id = session.id;
        let (status, receiver) = watch::channel(session);
        let status = Arc::new(status);
        let token = CancellationToken::new();

        let superseded = {
            let mut live = inner.live.lock();
            let previous = live.insert(
                zone,
                LiveSession {
                    id,
                    token: token.clone(),
                    status: Arc::clone(&status),
                },
            );
            inner.zones.set_active_fade(zone, Some(id));
            previous.map(|previous| {
                previous.token.cancel();
                previous
                    .status
                    .send_modify(|s| s.state = FadeState::Superseded);
                previous.id
            })
        };

        if let Some(previous) = superseded {
            tracing::info!(%zone, session = %previous, by = %id, "fade superseded");
            inner.events.publish(HubEvent::FadeSuperseded {
                session: previous,
                zone,
                by: id,
            });
        }

        tracing::info!(%zone, session = %id, target = %target, duration = %duration, "fade requested");
        inner.events.publish(HubEvent::FadeStarted {
            session: id,
            zone,
            target,
            duration,
        });

        tokio::spawn(run_session(Arc::clone(inner), zone, id, token, status));
        FadeHandle::new(receiver)
    }

    /// Cancels the live session of `zone` and holds the zone where the
    /// fade had brought it.
    ///
    /// The hold level is estimated from the session's progress through its
    /// running command. The zone's cached level is not used, since the hub
    /// acknowledges a fade with its end level.
    ///
    /// Returns the cancelled session, or `None` if the zone had no live
    /// session (no command is sent then).
    ///
    /// # Errors
    ///
    /// Returns the error of the hold command, or of the level query sent
    /// first when the session never knew its start level. The session is
    /// cancelled either way.
    pub async fn cancel_fade(&self, zone: ZoneId) -> Result<Option<FadeSessionId>, ProtocolError> {
        let Some(session) = self.cancel(zone) else {
            return Ok(None);
        };

        let level = match session.level_at(Instant::now()) {
            Some(level) => level,
            None => self.query_level(zone).await?,
        };
        tracing::debug!(%zone, %level, "holding zone after cancel");
        self.inner
            .executor
            .execute(OutputCommand::hold(zone, level))
            .await?;
        Ok(Some(session.id))
    }

    /// Cancels the live session of `zone` without sending anything.
    ///
    /// Returns the cancelled session, if any.
    pub fn interrupt(&self, zone: ZoneId) -> Option<FadeSessionId> {
        self.cancel(zone).map(|session| session.id)
    }

    fn cancel(&self, zone: ZoneId) -> Option<FadeSession> {
        let session = self
            .inner
            .finish(zone, None, FadeState::Cancelled, None)?;
        tracing::info!(%zone, session = %session.id, "fade cancelled");
        self.inner.events.publish(HubEvent::FadeCancelled {
            session: session.id,
            zone,
        });
        Some(session)
    }

    /// Asks the hub for the current level of `zone`.
    ///
    /// # Errors
    ///
    /// Returns the command error, or `UnexpectedReply` if the reply carries
    /// no level.
    pub async fn query_level(&self, zone: ZoneId) -> Result<Brightness, ProtocolError> {
        let reply = self
            .inner
            .executor
            .execute(OutputCommand::QueryLevel { zone })
            .await?;
        level_from_reply(&reply)
    }

    /// Fails every live session with `error`.
    ///
    /// Called when the link drops: the hub's clock keeps running while no
    /// commands can be sent, so the sessions cannot be resumed.
    pub fn fail_all(&self, error: &ProtocolError) {
        let live: Vec<(ZoneId, FadeSessionId)> = self
            .inner
            .live
            .lock()
            .iter()
            .map(|(zone, session)| (*zone, session.id))
            .collect();
        for (zone, id) in live {
            self.inner.fail(zone, id, error.clone());
        }
    }

    /// Cancels every live session without sending anything.
    pub fn shutdown(&self) {
        let zones: Vec<ZoneId> = self.inner.live.lock().keys().copied().collect();
        for zone in zones {
            self.interrupt(zone);
        }
    }

    /// Returns a snapshot of the live session of `zone`.
    #[must_use]
    pub fn session(&self, zone: ZoneId) -> Option<FadeSession> {
        self.inner
            .live
            .lock()
            .get(&zone)
            .map(|s| s.status.borrow().clone())
    }

    /// Returns snapshots of all live sessions.
    #[must_use]
    pub fn live_sessions(&self) -> Vec<FadeSession> {
        self.inner
            .live
            .lock()
            .values()
            .map(|s| s.status.borrow().clone())
            .collect()
    }
}

impl<E> fmt::Debug for FadeScheduler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FadeScheduler")
            .field("cap", &self.inner.cap)
            .field("live", &self.inner.live.lock().len())
            .finish_non_exhaustive()
    }
}

fn level_from_reply(reply: &str) -> Result<Brightness, ProtocolError> {
    match HubMessage::parse(reply) {
        Ok(HubMessage::OutputLevel { level, .. }) => Ok(level),
        _ => Err(ProtocolError::UnexpectedReply(reply.to_string())),
    }
}

async fn run_session<E: CommandExecutor>(
    inner: Arc<Inner<E>>,
    zone: ZoneId,
    id: FadeSessionId,
    token: CancellationToken,
    status: Arc<watch::Sender<FadeSession>>,
) {
    let (known_start, target, duration) = {
        let session = status.borrow();
        (session.start, session.target, session.duration)
    };

    let start = match known_start {
        Some(level) => Some(level),
        // Interpolation needs a start; a single step goes straight to the target
        None if FadePlan::step_count(duration, inner.cap) > 1 => {
            if token.is_cancelled() {
                return;
            }
            let reply = inner
                .executor
                .execute(OutputCommand::QueryLevel { zone })
                .await;
            if token.is_cancelled() {
                return;
            }
            match reply.and_then(|line| level_from_reply(&line)) {
                Ok(level) => Some(level),
                Err(error) => {
                    inner.fail(zone, id, error);
                    return;
                }
            }
        }
        None => None,
    };

    let plan = FadePlan::new(start.unwrap_or(target), target, duration, inner.cap);
    if !inner.mark_running(zone, id, start, &plan) {
        return;
    }
    tracing::debug!(%zone, session = %id, steps = plan.step_total(), "fade running");

    for (issued, step) in (1..).zip(plan.steps()) {
        if token.is_cancelled() {
            return;
        }
        let result = inner
            .executor
            .execute(OutputCommand::set_level(zone, step.level, step.fade))
            .await;
        if token.is_cancelled() {
            tracing::debug!(%zone, session = %id, "discarding reply of ended fade");
            return;
        }
        if let Err(error) = result {
            inner.fail(zone, id, error);
            return;
        }
        status.send_modify(|s| {
            s.issued = issued;
            s.step_started = Some(Instant::now());
        });

        tokio::select! {
            () = token.cancelled() => return,
            () = tokio::time::sleep(step.fade.as_duration()) => {}
        }
    }

    inner.complete(zone, id, target);
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The hub facade.
//!
//! [`Hub`] wires the connection, the command correlator, the zone registry
//! and the fade scheduler together and is the type applications hold.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::{broadcast, watch};

use crate::command::OutputCommand;
use crate::config::{HubConfig, ZoneConfig};
use crate::error::{Error, ProtocolError, Result, ValueError};
use crate::event::{EventBus, FadeSessionId, HubEvent};
use crate::fade::{FadeHandle, FadeScheduler, FadeSession};
use crate::protocol::{
    ButtonEvent, CommandExecutor, Connection, ConnectionState, Correlator, HubMessage,
    NotificationHandler,
};
use crate::report::{ZoneReport, parse_report};
use crate::subscription::{Subscribable, SubscriptionId};
use crate::types::{Brightness, FadeDuration, ZoneId};
use crate::zone::{Zone, ZoneRegistry};

/// Applies unsolicited hub reports to the zone registry and fails live
/// fades when the link drops.
struct ZoneUpdater {
    zones: Arc<ZoneRegistry>,
    events: EventBus,
    fades: OnceLock<FadeScheduler<Correlator>>,
}

impl NotificationHandler for ZoneUpdater {
    fn handle(&self, message: &HubMessage) {
        match message {
            HubMessage::OutputLevel { zone, level } => {
                if !self.zones.contains(*zone) {
                    tracing::trace!(%zone, "level report for unconfigured zone");
                    return;
                }
                let previous = self.zones.set_brightness(*zone, *level);
                self.events.publish(HubEvent::ZoneLevelChanged {
                    zone: *zone,
                    level: *level,
                    previous,
                });
            }
            HubMessage::Button(event) => {
                tracing::trace!(device = event.device, component = event.component, "button event");
                self.events.publish(HubEvent::ButtonPressed(*event));
            }
            HubMessage::Error(_) | HubMessage::Other(_) => {}
        }
    }

    fn link_lost(&self) {
        // The hub's clock keeps running while no commands can be sent
        if let Some(fades) = self.fades.get() {
            fades.fail_all(&ProtocolError::ConnectionLost);
        }
    }
}

struct HubInner {
    config: HubConfig,
    correlator: Correlator,
    zones: Arc<ZoneRegistry>,
    events: EventBus,
    scheduler: FadeScheduler<Correlator>,
    shut_down: AtomicBool,
}

/// A connected Lutron hub.
///
/// Cloning is cheap; all clones share the connection.
///
/// # Examples
///
/// ```no_run
/// use lipfade::{Brightness, FadeDuration, Hub, HubConfig, ZoneId};
///
/// #[tokio::main]
/// async fn main() -> lipfade::Result<()> {
///     let config = HubConfig::builder().host("192.168.1.20").build()?;
///     let hub = Hub::configure(config).await?;
///
///     let report = hub.discover_zones("Zones:\n28, Bedroom, DIMMER\n5, Kitchen\n");
///     println!("found {} zones", report.zones.len());
///
///     // Two and a half hours, longer than the hub runs on its own
///     let handle = hub.request_fade(
///         ZoneId::new(28)?,
///         Brightness::OFF,
///         FadeDuration::from_minutes(150),
///     )?;
///     println!("fade ended: {}", handle.finished().await);
///
///     hub.shutdown();
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Connects to the hub, logs in and loads the configured zones.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the first connection or login fails.
    pub async fn configure(config: HubConfig) -> Result<Self> {
        let zones = Arc::new(ZoneRegistry::new());
        for zone in config.zones() {
            zones.upsert(Zone::new(zone.zone_id, zone.name.clone()));
        }
        let events = EventBus::with_capacity(config.event_capacity());

        let (connection, link_events) = Connection::connect(config.clone()).await?;
        let handler = Arc::new(ZoneUpdater {
            zones: Arc::clone(&zones),
            events: events.clone(),
            fades: OnceLock::new(),
        });
        let correlator = Correlator::start(
            connection.clone(),
            link_events,
            Arc::clone(&handler),
            config.command_timeout(),
            config.keepalive().clone(),
        );
        let scheduler = FadeScheduler::new(
            correlator.clone(),
            Arc::clone(&zones),
            events.clone(),
            config.fade_cap(),
        );
        let _ = handler.fades.set(scheduler.clone());

        tokio::spawn(follow_connection(connection.watch_state(), events.clone()));

        tracing::info!(
            host = %config.host(),
            port = config.port(),
            zones = zones.len(),
            "hub configured"
        );

        Ok(Self {
            inner: Arc::new(HubInner {
                config,
                correlator,
                zones,
                events,
                scheduler,
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the configuration the hub was started with.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Returns the connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.correlator.connection().state()
    }

    /// Returns a receiver of connection state transitions.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.correlator.connection().watch_state()
    }

    /// Returns a receiver of every hub event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.inner.events.subscribe()
    }

    /// Reads the zones from an integration report and adds them.
    ///
    /// Known zones are renamed; their observed level is kept. The report is
    /// returned so the caller can inspect skipped lines.
    pub fn discover_zones(&self, report_text: &str) -> ZoneReport {
        let report = parse_report(report_text);
        let mut added = 0;
        for zone in &report.zones {
            if self.inner.zones.upsert(zone.clone()) {
                added += 1;
            }
        }
        tracing::info!(
            found = report.zones.len(),
            added,
            skipped = report.skipped_count(),
            "zones discovered"
        );
        report
    }

    /// Adds a zone by hand. Returns `true` if it was new.
    pub fn add_zone(&self, zone: ZoneConfig) -> bool {
        self.inner.zones.upsert(Zone::new(zone.zone_id, zone.name))
    }

    /// Returns all known zones in id order.
    #[must_use]
    pub fn zones(&self) -> Vec<Zone> {
        self.inner.zones.list()
    }

    /// Returns a known zone.
    #[must_use]
    pub fn zone(&self, id: ZoneId) -> Option<Zone> {
        self.inner.zones.get(id)
    }

    /// Returns the live fade of a zone, if any.
    #[must_use]
    pub fn fade_session(&self, zone: ZoneId) -> Option<FadeSession> {
        self.inner.scheduler.session(zone)
    }

    /// Fades `zone` to `target` over `duration`, superseding any running
    /// fade of the zone.
    ///
    /// Fades longer than the configured cap are run as several native
    /// fades. Returns as soon as the fade is accepted.
    ///
    /// # Errors
    ///
    /// Returns `ShutDown` after [`shutdown`](Self::shutdown) and
    /// `ZoneNotFound` for an unknown zone. Command failures surface through
    /// the handle and the fade-failed event.
    pub fn request_fade(
        &self,
        zone: ZoneId,
        target: Brightness,
        duration: FadeDuration,
    ) -> Result<FadeHandle> {
        self.check_zone(zone)?;
        Ok(self.inner.scheduler.request_fade(zone, target, duration))
    }

    /// Stops the running fade of `zone` and holds the zone where it is.
    ///
    /// Returns the cancelled session, or `None` if no fade was running.
    ///
    /// # Errors
    ///
    /// Returns `ShutDown`, `ZoneNotFound`, or the error of the hold
    /// command.
    pub async fn cancel_fade(&self, zone: ZoneId) -> Result<Option<FadeSessionId>> {
        self.check_zone(zone)?;
        Ok(self.inner.scheduler.cancel_fade(zone).await?)
    }

    /// Sets `zone` to `level` with a single native fade, cancelling any
    /// running fade of the zone.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::FadeTooLong` if `fade` exceeds the cap, and the
    /// command error if the hub does not acknowledge.
    pub async fn set_level(&self, zone: ZoneId, level: Brightness, fade: FadeDuration) -> Result<()> {
        self.check_zone(zone)?;
        let cap = self.inner.scheduler.cap();
        if fade > cap {
            return Err(ValueError::FadeTooLong {
                requested: fade.seconds(),
                limit: cap.seconds(),
            }
            .into());
        }
        self.inner.scheduler.interrupt(zone);
        self.inner
            .correlator
            .execute(OutputCommand::set_level(zone, level, fade))
            .await?;
        Ok(())
    }

    /// Asks the hub for the current level of `zone`.
    ///
    /// The zone registry is updated by the reply.
    ///
    /// # Errors
    ///
    /// Returns `ShutDown`, `ZoneNotFound`, or the command error.
    pub async fn query_level(&self, zone: ZoneId) -> Result<Brightness> {
        self.check_zone(zone)?;
        Ok(self.inner.scheduler.query_level(zone).await?)
    }

    /// Cancels all fades and closes the connection.
    ///
    /// Later calls that talk to the hub return `Error::ShutDown`.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.scheduler.shutdown();
        self.inner.correlator.connection().shutdown();
        tracing::info!(host = %self.inner.config.host(), "hub shut down");
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    fn check_zone(&self, zone: ZoneId) -> Result<()> {
        if self.is_shut_down() {
            return Err(Error::ShutDown);
        }
        if !self.inner.zones.contains(zone) {
            return Err(Error::ZoneNotFound(zone));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("host", &self.inner.config.host())
            .field("state", &self.connection_state())
            .field("zones", &self.inner.zones.len())
            .finish_non_exhaustive()
    }
}

impl Subscribable for Hub {
    fn on_zone_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ZoneId, Brightness) + Send + Sync + 'static,
    {
        self.inner.events.callbacks().on_zone_state_changed(callback)
    }

    fn on_fade_completed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(FadeSessionId, ZoneId, Brightness) + Send + Sync + 'static,
    {
        self.inner.events.callbacks().on_fade_completed(callback)
    }

    fn on_fade_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(FadeSessionId, ZoneId, &ProtocolError) + Send + Sync + 'static,
    {
        self.inner.events.callbacks().on_fade_failed(callback)
    }

    fn on_connection_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.inner.events.callbacks().on_connection_changed(callback)
    }

    fn on_button_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ButtonEvent) + Send + Sync + 'static,
    {
        self.inner.events.callbacks().on_button_event(callback)
    }

    fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        self.inner.events.callbacks().on_event(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.callbacks().unsubscribe(id)
    }
}

/// Publishes connection transitions.
async fn follow_connection(mut state: watch::Receiver<ConnectionState>, events: EventBus) {
    let mut last = *state.borrow_and_update();

    while state.changed().await.is_ok() {
        let current = *state.borrow_and_update();
        // Ready to ready means the reconnecting state was coalesced away
        if last.is_ready() && current.is_ready() {
            events.publish(HubEvent::ConnectionChanged {
                state: ConnectionState::Reconnecting,
            });
        }
        events.publish(HubEvent::ConnectionChanged { state: current });
        if current == ConnectionState::Disconnected {
            break;
        }
        last = current;
    }
}

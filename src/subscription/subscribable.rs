// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for types that publish hub events to callbacks.

use crate::error::ProtocolError;
use crate::event::{FadeSessionId, HubEvent};
use crate::protocol::{ButtonEvent, ConnectionState};
use crate::subscription::SubscriptionId;
use crate::types::{Brightness, ZoneId};

/// Trait for types that support callback subscriptions.
///
/// # Examples
///
/// ```no_run
/// use lipfade::{Hub, HubConfig};
/// use lipfade::subscription::Subscribable;
///
/// # async fn example() -> lipfade::Result<()> {
/// let hub = Hub::configure(HubConfig::builder().host("192.168.1.20").build()?).await?;
///
/// let sub_id = hub.on_zone_state_changed(|zone, level| {
///     println!("zone {zone} is at {level}");
/// });
///
/// hub.on_fade_failed(|session, zone, error| {
///     eprintln!("fade {session} on zone {zone} failed: {error}");
/// });
///
/// hub.unsubscribe(sub_id);
/// # Ok(())
/// # }
/// ```
pub trait Subscribable {
    /// Subscribes to zone level changes.
    ///
    /// Called for every level report of a known zone, and when a completed
    /// fade changes the cached level.
    fn on_zone_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ZoneId, Brightness) + Send + Sync + 'static;

    /// Subscribes to fade completions.
    fn on_fade_completed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(FadeSessionId, ZoneId, Brightness) + Send + Sync + 'static;

    /// Subscribes to fade failures.
    ///
    /// Called once per failed session with the error that stopped it.
    fn on_fade_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(FadeSessionId, ZoneId, &ProtocolError) + Send + Sync + 'static;

    /// Subscribes to connection state changes.
    fn on_connection_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static;

    /// Subscribes to keypad button events.
    fn on_button_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ButtonEvent) + Send + Sync + 'static;

    /// Subscribes to every event.
    fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&HubEvent) + Send + Sync + 'static;

    /// Unsubscribes a callback by its subscription ID.
    ///
    /// Returns `true` if the subscription was found and removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

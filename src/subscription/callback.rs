// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for hub event subscriptions.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry for storing and dispatching callbacks

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::ProtocolError;
use crate::event::{FadeSessionId, HubEvent};
use crate::protocol::{ButtonEvent, ConnectionState};
use crate::types::{Brightness, ZoneId};

/// Unique identifier for a subscription.
///
/// Returned when registering a callback and used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type ZoneStateCallback = Arc<dyn Fn(ZoneId, Brightness) + Send + Sync>;
type FadeCompletedCallback = Arc<dyn Fn(FadeSessionId, ZoneId, Brightness) + Send + Sync>;
type FadeFailedCallback = Arc<dyn Fn(FadeSessionId, ZoneId, &ProtocolError) + Send + Sync>;
type ConnectionCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;
type ButtonCallback = Arc<dyn Fn(ButtonEvent) + Send + Sync>;
type EventCallback = Arc<dyn Fn(&HubEvent) + Send + Sync>;

type Slot<C> = RwLock<HashMap<SubscriptionId, C>>;

/// Registry of subscription callbacks.
///
/// Callbacks run synchronously on the task that publishes the event. They
/// are snapshotted before being called, so a callback may subscribe or
/// unsubscribe without deadlocking.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    zone_state: Slot<ZoneStateCallback>,
    fade_completed: Slot<FadeCompletedCallback>,
    fade_failed: Slot<FadeFailedCallback>,
    connection: Slot<ConnectionCallback>,
    button: Slot<ButtonCallback>,
    events: Slot<EventCallback>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            zone_state: RwLock::new(HashMap::new()),
            fade_completed: RwLock::new(HashMap::new()),
            fade_failed: RwLock::new(HashMap::new()),
            connection: RwLock::new(HashMap::new()),
            button: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn insert<C>(&self, slot: &Slot<C>, callback: C) -> SubscriptionId {
        let id = self.next_id();
        slot.write().insert(id, callback);
        id
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for zone level changes.
    pub fn on_zone_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ZoneId, Brightness) + Send + Sync + 'static,
    {
        self.insert(&self.zone_state, Arc::new(callback))
    }

    /// Registers a callback for completed fades.
    pub fn on_fade_completed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(FadeSessionId, ZoneId, Brightness) + Send + Sync + 'static,
    {
        self.insert(&self.fade_completed, Arc::new(callback))
    }

    /// Registers a callback for failed fades.
    pub fn on_fade_failed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(FadeSessionId, ZoneId, &ProtocolError) + Send + Sync + 'static,
    {
        self.insert(&self.fade_failed, Arc::new(callback))
    }

    /// Registers a callback for connection state changes.
    pub fn on_connection_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.insert(&self.connection, Arc::new(callback))
    }

    /// Registers a callback for keypad button events.
    pub fn on_button_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ButtonEvent) + Send + Sync + 'static,
    {
        self.insert(&self.button, Arc::new(callback))
    }

    /// Registers a callback that receives every event.
    pub fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        self.insert(&self.events, Arc::new(callback))
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.zone_state.write().remove(&id).is_some()
            || self.fade_completed.write().remove(&id).is_some()
            || self.fade_failed.write().remove(&id).is_some()
            || self.connection.write().remove(&id).is_some()
            || self.button.write().remove(&id).is_some()
            || self.events.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.zone_state.write().clear();
        self.fade_completed.write().clear();
        self.fade_failed.write().clear();
        self.connection.write().clear();
        self.button.write().clear();
        self.events.write().clear();
    }

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zone_state.read().len()
            + self.fade_completed.read().len()
            + self.fade_failed.read().len()
            + self.connection.read().len()
            + self.button.read().len()
            + self.events.read().len()
    }

    /// Returns `true` if no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Calls every callback interested in `event`.
    pub fn dispatch(&self, event: &HubEvent) {
        for callback in snapshot(&self.events) {
            callback(event);
        }

        match event {
            HubEvent::ZoneLevelChanged { zone, level, .. } => {
                for callback in snapshot(&self.zone_state) {
                    callback(*zone, *level);
                }
            }
            HubEvent::FadeCompleted {
                session,
                zone,
                level,
            } => {
                for callback in snapshot(&self.fade_completed) {
                    callback(*session, *zone, *level);
                }
            }
            HubEvent::FadeFailed {
                session,
                zone,
                error,
            } => {
                for callback in snapshot(&self.fade_failed) {
                    callback(*session, *zone, error);
                }
            }
            HubEvent::ConnectionChanged { state } => {
                for callback in snapshot(&self.connection) {
                    callback(*state);
                }
            }
            HubEvent::ButtonPressed(button) => {
                for callback in snapshot(&self.button) {
                    callback(*button);
                }
            }
            HubEvent::FadeStarted { .. }
            | HubEvent::FadeSuperseded { .. }
            | HubEvent::FadeCancelled { .. } => {
                // Only seen by on_event callbacks
            }
        }
    }
}

fn snapshot<C: Clone>(slot: &Slot<C>) -> Vec<C> {
    slot.read().values().cloned().collect()
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callbacks", &self.len())
            .finish_non_exhaustive()
    }
}

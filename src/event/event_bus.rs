// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting hub events.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::DEFAULT_EVENT_CAPACITY;
use crate::subscription::CallbackRegistry;

use super::HubEvent;

/// Broadcasts hub events to channel subscribers and registered callbacks.
///
/// Each [`publish`](Self::publish) first runs the matching callbacks, then
/// sends the event on the broadcast channel.
///
/// # Capacity
///
/// A slow channel subscriber loses the oldest events once `capacity`
/// events are buffered, and sees `RecvError::Lagged`.
///
/// # Examples
///
/// ```
/// use lipfade::event::{EventBus, HubEvent};
/// use lipfade::protocol::ConnectionState;
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(HubEvent::ConnectionChanged { state: ConnectionState::Ready });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<HubEvent>,
    callbacks: Arc<CallbackRegistry>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a new event bus with the specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            callbacks: Arc::new(CallbackRegistry::new()),
        }
    }

    /// Subscribes to hub events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    /// Returns the callback registry fed by this bus.
    #[must_use]
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Returns the number of channel subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event to callbacks and channel subscribers.
    pub fn publish(&self, event: HubEvent) {
        tracing::trace!(?event, "publishing");
        self.callbacks.dispatch(&event);
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for zone, fade and connection changes.
//!
//! The [`EventBus`] feeds both a tokio broadcast channel and the
//! [`CallbackRegistry`](crate::subscription::CallbackRegistry), so callers
//! can pick whichever style suits them.
//!
//! # Examples
//!
//! ```
//! use lipfade::event::{EventBus, FadeSessionId, HubEvent};
//! use lipfade::types::ZoneId;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(HubEvent::FadeCancelled {
//!     session: FadeSessionId::new(),
//!     zone: ZoneId::new(5).unwrap(),
//! });
//! ```

mod event_bus;
mod hub_event;
mod session_id;

pub use event_bus::EventBus;
pub use hub_event::HubEvent;
pub use session_id::FadeSessionId;

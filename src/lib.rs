// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `lipfade` - long-duration fades over the Lutron Integration Protocol.
//!
//! Lutron hubs (RadioRA 2, HomeWorks QS, Caséta Pro) expose a telnet
//! "integration" port that accepts line commands such as
//! `#OUTPUT,28,1,0,3600`. A single command can fade a zone for a limited
//! time only. This library keeps one persistent connection to the hub and
//! runs fades of any length as a sequence of native fades.
//!
//! # Supported Features
//!
//! - **Connection**: login handshake, keep-alive, reconnection with backoff
//! - **Commands**: one command in flight at a time, reply matching, timeouts
//! - **Fades**: chunked long fades, per-zone supersession, cancellation
//! - **Discovery**: zones from the hub's integration report text
//! - **Events**: zone levels, fade outcomes, keypad buttons
//!
//! # Quick Start
//!
//! ```no_run
//! use lipfade::{Brightness, FadeDuration, Hub, HubConfig, ZoneConfig, ZoneId};
//!
//! #[tokio::main]
//! async fn main() -> lipfade::Result<()> {
//!     let bedroom = ZoneId::new(28)?;
//!     let config = HubConfig::builder()
//!         .host("192.168.1.20")
//!         .zone(ZoneConfig::new(bedroom, "Bedroom"))
//!         .build()?;
//!     let hub = Hub::configure(config).await?;
//!
//!     // Sunrise over three hours
//!     let handle = hub.request_fade(bedroom, Brightness::FULL, FadeDuration::from_minutes(180))?;
//!     println!("fade {} started", handle.id());
//!
//!     // Direct level change with a native fade
//!     hub.set_level(bedroom, Brightness::new(40)?, FadeDuration::from_seconds(2)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Events
//!
//! ```no_run
//! use lipfade::{Hub, HubConfig, subscription::Subscribable};
//!
//! #[tokio::main]
//! async fn main() -> lipfade::Result<()> {
//!     let hub = Hub::configure(HubConfig::builder().host("192.168.1.20").build()?).await?;
//!
//!     hub.on_zone_state_changed(|zone, level| {
//!         println!("zone {zone} is at {level}");
//!     });
//!
//!     hub.on_fade_completed(|session, zone, level| {
//!         println!("fade {session} brought zone {zone} to {level}");
//!     });
//!
//!     let mut events = hub.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod fade;
mod hub;
pub mod protocol;
pub mod report;
pub mod subscription;
pub mod types;
pub mod zone;

pub use command::{Command, OutputCommand};
pub use config::{HubConfig, HubConfigBuilder, KeepAlivePolicy, ReconnectionPolicy, ZoneConfig};
pub use error::{Error, HubErrorCode, ParseError, ProtocolError, Result, ValueError};
pub use event::{EventBus, FadeSessionId, HubEvent};
pub use fade::{FadeHandle, FadeSession, FadeState};
pub use hub::Hub;
pub use protocol::{ButtonAction, ButtonEvent, ConnectionState, Credentials};
pub use report::{SkipReason, SkippedLine, ZoneReport, parse_report};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
pub use types::{Brightness, FadeDuration, ZoneId};
pub use zone::Zone;

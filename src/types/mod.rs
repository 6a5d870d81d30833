// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for zone control.
//!
//! Each type ensures values are within their valid ranges at construction
//! time.
//!
//! # Types
//!
//! - [`ZoneId`] - Hub-assigned integration id of a zone
//! - [`Brightness`] - Output level (0-100%)
//! - [`FadeDuration`] - Requested transition length in whole seconds

mod brightness;
mod fade_duration;
mod zone_id;

pub use brightness::Brightness;
pub use fade_duration::FadeDuration;
pub use zone_id::ZoneId;

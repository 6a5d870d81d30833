// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fades longer than the hub can run natively.
//!
//! - [`FadePlan`] splits a requested fade into native commands
//! - [`FadeScheduler`] issues those commands over time, one session per zone
//! - [`FadeHandle`] lets the caller follow a session to its end

mod plan;
mod scheduler;
mod session;

pub use plan::{FadePlan, FadeStep};
pub use scheduler::FadeScheduler;
pub use session::{FadeHandle, FadeSession, FadeState};

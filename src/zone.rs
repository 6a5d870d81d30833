// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zones known to a hub and their last observed state.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::event::FadeSessionId;
use crate::types::{Brightness, ZoneId};

/// A lighting zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Integration id.
    pub id: ZoneId,
    /// Display name.
    pub name: String,
    /// Device type from the integration report, if listed.
    pub device_type: Option<String>,
    /// Last observed level; `None` until the hub reports one.
    pub brightness: Option<Brightness>,
    /// The fade currently driving this zone.
    pub active_fade: Option<FadeSessionId>,
}

impl Zone {
    /// Creates a zone with unknown level.
    #[must_use]
    pub fn new(id: ZoneId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            device_type: None,
            brightness: None,
            active_fade: None,
        }
    }

    /// Sets the device type.
    #[must_use]
    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }
}

/// Thread-safe table of zones, ordered by id.
#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: RwLock<BTreeMap<ZoneId, Zone>>,
}

impl ZoneRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a zone, or renames it if already known.
    ///
    /// Observed level and active fade of a known zone are kept. Returns
    /// `true` if the zone was new.
    pub fn upsert(&self, zone: Zone) -> bool {
        let mut zones = self.zones.write();
        match zones.get_mut(&zone.id) {
            Some(existing) => {
                existing.name = zone.name;
                if zone.device_type.is_some() {
                    existing.device_type = zone.device_type;
                }
                false
            }
            None => {
                zones.insert(zone.id, zone);
                true
            }
        }
    }

    /// Returns a copy of a zone.
    #[must_use]
    pub fn get(&self, id: ZoneId) -> Option<Zone> {
        self.zones.read().get(&id).cloned()
    }

    /// Returns `true` if the zone is known.
    #[must_use]
    pub fn contains(&self, id: ZoneId) -> bool {
        self.zones.read().contains_key(&id)
    }

    /// Returns copies of all zones in id order.
    #[must_use]
    pub fn list(&self) -> Vec<Zone> {
        self.zones.read().values().cloned().collect()
    }

    /// Returns the number of zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.read().len()
    }

    /// Returns `true` if no zones are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.read().is_empty()
    }

    /// Returns the last observed level of a zone.
    #[must_use]
    pub fn brightness(&self, id: ZoneId) -> Option<Brightness> {
        self.zones.read().get(&id).and_then(|z| z.brightness)
    }

    /// Records an observed level.
    ///
    /// Returns the previous level, or `None` for an unknown zone or a zone
    /// whose level was not yet known.
    pub fn set_brightness(&self, id: ZoneId, level: Brightness) -> Option<Brightness> {
        let mut zones = self.zones.write();
        let zone = zones.get_mut(&id)?;
        zone.brightness.replace(level)
    }

    /// Returns the active fade of a zone.
    #[must_use]
    pub fn active_fade(&self, id: ZoneId) -> Option<FadeSessionId> {
        self.zones.read().get(&id).and_then(|z| z.active_fade)
    }

    /// Sets or clears the active fade of a zone. Unknown zones are ignored.
    pub fn set_active_fade(&self, id: ZoneId, session: Option<FadeSessionId>) {
        if let Some(zone) = self.zones.write().get_mut(&id) {
            zone.active_fade = session;
        }
    }
}

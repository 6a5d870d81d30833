// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Hub configuration.
//!
//! A [`HubConfig`] is built with [`HubConfig::builder`] or parsed from the
//! host's JSON config entry with [`HubConfig::from_json`]. Both paths run the
//! same validation.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use lipfade::HubConfig;
//!
//! let config = HubConfig::builder()
//!     .host("192.168.1.20")
//!     .credentials("lutron", "integration")
//!     .command_timeout(Duration::from_secs(3))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.port(), 23);
//! assert_eq!(config.fade_cap().seconds(), 7200);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{Credentials, DEFAULT_PASSWORD, DEFAULT_USERNAME, LipCodec, PromptPattern};
use crate::types::{FadeDuration, ZoneId};

/// Default telnet port of the integration interface.
pub const DEFAULT_PORT: u16 = 23;

/// Default longest fade a single hub command may carry.
pub const DEFAULT_FADE_CAP: FadeDuration = FadeDuration::from_seconds(7200);

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Keep-alive probing of an idle link.
///
/// After `idle` without outbound traffic the probe command is queued like
/// any other command. If its reply does not arrive within `grace` the link
/// is considered dead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAlivePolicy {
    /// Whether the link is probed at all.
    pub enabled: bool,
    /// Outbound silence before a probe is sent.
    pub idle: Duration,
    /// Time allowed for the probe's reply.
    pub grace: Duration,
    /// The probe line.
    pub probe: String,
}

impl KeepAlivePolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that never probes.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the idle threshold.
    #[must_use]
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Sets the grace window.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Sets the probe line.
    #[must_use]
    pub fn with_probe(mut self, probe: impl Into<String>) -> Self {
        self.probe = probe.into();
        self
    }
}

impl Default for KeepAlivePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            idle: Duration::from_secs(60),
            grace: Duration::from_secs(10),
            probe: "?OUTPUT,1,1".to_string(),
        }
    }
}

/// Backoff between reconnection attempts.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use lipfade::ReconnectionPolicy;
///
/// let policy = ReconnectionPolicy::default();
/// assert!(policy.should_retry(1_000));
///
/// let policy = ReconnectionPolicy::new()
///     .with_max_retries(3)
///     .with_initial_delay(Duration::from_millis(100));
/// assert!(!policy.should_retry(3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectionPolicy {
    /// Whether automatic reconnection is enabled.
    pub enabled: bool,
    /// Maximum number of attempts before giving up (None = retry forever).
    pub max_retries: Option<u32>,
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound for the delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f32,
}

impl ReconnectionPolicy {
    /// Creates a reconnection policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that never reconnects.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the delay before the first attempt.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the upper bound for the delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Returns the delay to wait before attempt number `attempt` (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let multiplier = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.initial_delay.as_millis() as f32 * multiplier;

        // Saturating cast; powi overflow yields infinity which clamps to u64::MAX
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }

    /// Returns true if attempt number `attempt` (0-based) should be made.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && self.max_retries.is_none_or(|max| attempt < max)
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

/// A zone known from configuration rather than discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Integration id of the zone.
    #[serde(alias = "id")]
    pub zone_id: ZoneId,
    /// Display name.
    pub name: String,
}

impl ZoneConfig {
    /// Creates a zone entry.
    #[must_use]
    pub fn new(zone_id: ZoneId, name: impl Into<String>) -> Self {
        Self {
            zone_id,
            name: name.into(),
        }
    }
}

/// Validated configuration of one hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    host: String,
    port: u16,
    credentials: Credentials,
    login_timeout: Duration,
    command_timeout: Duration,
    keepalive: KeepAlivePolicy,
    reconnection: ReconnectionPolicy,
    fade_cap: FadeDuration,
    event_capacity: usize,
    prompts: Option<Vec<PromptPattern>>,
    zones: Vec<ZoneConfig>,
}

impl HubConfig {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }

    /// Parses a JSON config entry.
    ///
    /// Recognised keys: `host` (required), `port`, `username`, `password`,
    /// `zones` (a list of `{ "zone_id": 28, "name": "Bedroom" }`),
    /// `zone_mappings` (an object of name to zone id) and
    /// `fade_cap_seconds`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if the JSON is malformed or the
    /// resulting configuration fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use lipfade::HubConfig;
    ///
    /// let config = HubConfig::from_json(r#"{
    ///     "host": "10.0.0.5",
    ///     "zones": [{ "zone_id": 28, "name": "Bedroom" }]
    /// }"#).unwrap();
    ///
    /// assert_eq!(config.credentials().username, "lutron");
    /// assert_eq!(config.zones().len(), 1);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let entry: ConfigEntry =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfiguration(e.to_string()))?;

        let mut builder = Self::builder()
            .host(entry.host)
            .port(entry.port)
            .credentials(entry.username, entry.password);
        if let Some(cap) = entry.fade_cap_seconds {
            builder = builder.fade_cap(FadeDuration::from_seconds(cap));
        }
        for zone in entry.zones {
            builder = builder.zone(zone);
        }
        for (name, zone_id) in entry.zone_mappings {
            builder = builder.zone(ZoneConfig::new(zone_id, name));
        }
        builder.build()
    }

    /// Returns the hub host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the telnet port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the login credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns how long the login prompts may take.
    #[must_use]
    pub fn login_timeout(&self) -> Duration {
        self.login_timeout
    }

    /// Returns how long a command waits for its reply.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Returns the keep-alive policy.
    #[must_use]
    pub fn keepalive(&self) -> &KeepAlivePolicy {
        &self.keepalive
    }

    /// Returns the reconnection policy.
    #[must_use]
    pub fn reconnection(&self) -> &ReconnectionPolicy {
        &self.reconnection
    }

    /// Returns the longest fade a single hub command may carry.
    #[must_use]
    pub fn fade_cap(&self) -> FadeDuration {
        self.fade_cap
    }

    /// Returns the capacity of the event broadcast channel.
    #[must_use]
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    /// Returns the statically configured zones.
    #[must_use]
    pub fn zones(&self) -> &[ZoneConfig] {
        &self.zones
    }

    /// Returns a codec with this hub's prompt table.
    #[must_use]
    pub fn codec(&self) -> LipCodec {
        match &self.prompts {
            Some(prompts) => LipCodec::new().with_prompts(prompts.clone()),
            None => LipCodec::new(),
        }
    }
}

/// Builder for [`HubConfig`].
#[derive(Debug, Clone)]
pub struct HubConfigBuilder {
    host: Option<String>,
    port: u16,
    credentials: Credentials,
    login_timeout: Duration,
    command_timeout: Duration,
    keepalive: KeepAlivePolicy,
    reconnection: ReconnectionPolicy,
    fade_cap: FadeDuration,
    event_capacity: usize,
    prompts: Option<Vec<PromptPattern>>,
    zones: Vec<ZoneConfig>,
}

impl Default for HubConfigBuilder {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            login_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(5),
            keepalive: KeepAlivePolicy::default(),
            reconnection: ReconnectionPolicy::default(),
            fade_cap: DEFAULT_FADE_CAP,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            prompts: None,
            zones: Vec::new(),
        }
    }
}

impl HubConfigBuilder {
    /// Sets the hub host name or address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the telnet port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the login credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Credentials::new(username, password);
        self
    }

    /// Sets the login timeout.
    #[must_use]
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Sets the per-command reply timeout.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the keep-alive policy.
    #[must_use]
    pub fn keepalive(mut self, policy: KeepAlivePolicy) -> Self {
        self.keepalive = policy;
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.reconnection = policy;
        self
    }

    /// Sets the longest fade a single hub command may carry.
    #[must_use]
    pub fn fade_cap(mut self, cap: FadeDuration) -> Self {
        self.fade_cap = cap;
        self
    }

    /// Sets the event broadcast capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Replaces the prompt table for firmware with non-standard prompts.
    #[must_use]
    pub fn prompts(mut self, prompts: Vec<PromptPattern>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Adds a statically configured zone.
    #[must_use]
    pub fn zone(mut self, zone: ZoneConfig) -> Self {
        self.zones.push(zone);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfiguration` if the host is missing, the
    /// fade cap or event capacity is zero, or the command timeout is not
    /// shorter than the keep-alive idle threshold.
    pub fn build(self) -> Result<HubConfig> {
        let host = self
            .host
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| Error::InvalidConfiguration("host is required".to_string()))?;

        if self.fade_cap.is_immediate() {
            return Err(Error::InvalidConfiguration(
                "fade cap must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidConfiguration(
                "event capacity must be greater than zero".to_string(),
            ));
        }
        if self.keepalive.enabled && self.command_timeout >= self.keepalive.idle {
            return Err(Error::InvalidConfiguration(format!(
                "command timeout ({:?}) must be shorter than keep-alive idle ({:?})",
                self.command_timeout, self.keepalive.idle
            )));
        }

        Ok(HubConfig {
            host,
            port: self.port,
            credentials: self.credentials,
            login_timeout: self.login_timeout,
            command_timeout: self.command_timeout,
            keepalive: self.keepalive,
            reconnection: self.reconnection,
            fade_cap: self.fade_cap,
            event_capacity: self.event_capacity,
            prompts: self.prompts,
            zones: self.zones,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ConfigEntry {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_username")]
    username: String,
    #[serde(default = "default_password")]
    password: String,
    #[serde(default)]
    zones: Vec<ZoneConfig>,
    #[serde(default)]
    zone_mappings: BTreeMap<String, ZoneId>,
    #[serde(default)]
    fade_cap_seconds: Option<u32>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = HubConfig::builder().host("hub.local").build().unwrap();
        assert_eq!(config.port(), 23);
        assert_eq!(config.credentials(), &Credentials::new("lutron", "integration"));
        assert_eq!(config.login_timeout(), Duration::from_secs(10));
        assert_eq!(config.command_timeout(), Duration::from_secs(5));
        assert_eq!(config.keepalive().idle, Duration::from_secs(60));
        assert_eq!(config.keepalive().probe, "?OUTPUT,1,1");
        assert_eq!(config.fade_cap(), FadeDuration::from_seconds(7200));
        assert_eq!(config.event_capacity(), 256);
        assert!(config.reconnection().max_retries.is_none());
    }

    #[test]
    fn host_is_required() {
        assert!(matches!(
            HubConfig::builder().build(),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(HubConfig::builder().host("  ").build().is_err());
    }

    #[test]
    fn command_timeout_must_be_below_keepalive_idle() {
        let result = HubConfig::builder()
            .host("hub")
            .command_timeout(Duration::from_secs(60))
            .build();
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        let result = HubConfig::builder()
            .host("hub")
            .command_timeout(Duration::from_secs(60))
            .keepalive(KeepAlivePolicy::disabled())
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn zero_fade_cap_is_rejected() {
        let result = HubConfig::builder()
            .host("hub")
            .fade_cap(FadeDuration::IMMEDIATE)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn parses_config_entry() {
        let config = HubConfig::from_json(
            r#"{
                "host": "192.168.1.20",
                "port": 2323,
                "username": "admin",
                "password": "secret",
                "zones": [{ "zone_id": 28, "name": "Bedroom" }],
                "zone_mappings": { "Kitchen": 5 },
                "fade_cap_seconds": 3600
            }"#,
        )
        .unwrap();

        assert_eq!(config.host(), "192.168.1.20");
        assert_eq!(config.port(), 2323);
        assert_eq!(config.credentials().username, "admin");
        assert_eq!(config.fade_cap().seconds(), 3600);
        assert_eq!(
            config.zones(),
            &[
                ZoneConfig::new(ZoneId::new(28).unwrap(), "Bedroom"),
                ZoneConfig::new(ZoneId::new(5).unwrap(), "Kitchen"),
            ]
        );
    }

    #[test]
    fn config_entry_rejects_zero_zone() {
        let result = HubConfig::from_json(r#"{ "host": "hub", "zones": [{ "id": 0, "name": "x" }] }"#);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn reconnection_backoff() {
        let policy = ReconnectionPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(1));

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(1));
    }

    #[test]
    fn reconnection_limits() {
        assert!(!ReconnectionPolicy::disabled().should_retry(0));
        let policy = ReconnectionPolicy::new().with_max_retries(2);
        assert!(policy.should_retry(1));
        assert!(!policy.should_retry(2));
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reply matching for commands sent on the shared line stream.
//!
//! The hub interleaves replies, echoes, and unrelated state pushes on one
//! stream. A [`ReplyMatcher`] describes which inbound line answers a given
//! command; the [`Correlator`](super::Correlator) completes the pending
//! command with the first line that matches.

use std::fmt;
use std::sync::Arc;

use crate::types::ZoneId;

/// Describes which inbound line completes a command.
#[derive(Clone)]
pub enum ReplyMatcher {
    /// The line starts with the given literal.
    Prefix(String),

    /// Any inbound line completes the command.
    AnyLine,

    /// A caller-supplied predicate.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ReplyMatcher {
    /// Matches lines starting with `prefix`.
    #[must_use]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::Prefix(prefix.into())
    }

    /// Matches the `~OUTPUT,<zone>,1,` level report of a zone.
    #[must_use]
    pub fn output_level(zone: ZoneId) -> Self {
        Self::Prefix(format!("~OUTPUT,{zone},1,"))
    }

    /// Matches the report answering a `?` query line.
    ///
    /// `?OUTPUT,1,1` is answered by `~OUTPUT,1,1,<level>`. Lines that are
    /// not queries are completed by any line.
    #[must_use]
    pub fn query_reply(query: &str) -> Self {
        match query.strip_prefix('?') {
            Some(rest) => Self::Prefix(format!("~{rest},")),
            None => Self::AnyLine,
        }
    }

    /// Matches lines accepted by `predicate`.
    #[must_use]
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Returns true if `line` completes the command.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Prefix(prefix) => line.starts_with(prefix.as_str()),
            Self::AnyLine => true,
            Self::Predicate(predicate) => predicate(line),
        }
    }
}

impl fmt::Debug for ReplyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            Self::AnyLine => f.write_str("AnyLine"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

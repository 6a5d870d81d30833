// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `lipfade` library.
//!
//! This module provides the error hierarchy used across the library: value
//! validation, protocol communication with the hub, wire-line parsing, and
//! hub-level operations.

use std::fmt;

use thiserror::Error;

use crate::types::ZoneId;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a hub line.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The zone is not known to the hub.
    #[error("zone {0} is not configured")]
    ZoneNotFound(ZoneId),

    /// The hub has been shut down.
    #[error("hub has been shut down")]
    ShutDown,

    /// Hub configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u32,
        /// Maximum allowed value.
        max: u32,
        /// The actual value that was provided.
        actual: u32,
    },

    /// A zone integration id of zero was provided.
    #[error("zone id must be greater than zero")]
    InvalidZoneId,

    /// A fade duration exceeds the hub's single-command limit.
    #[error("fade of {requested}s exceeds the native limit of {limit}s")]
    FadeTooLong {
        /// Requested fade time in seconds.
        requested: u32,
        /// Native limit in seconds.
        limit: u32,
    },
}

/// Error codes the hub sends back in `~ERROR,<n>` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HubErrorCode {
    /// 1 - Parameter count mismatch
    ParameterCount,
    /// 2 - Object does not exist
    NoSuchObject,
    /// 3 - Invalid action number
    InvalidAction,
    /// 4 - Parameter data out of range
    OutOfRange,
    /// 5 - Parameter data malformed
    Malformed,
    /// 6 - Unsupported command
    Unsupported,
    /// Any code this library does not know about.
    Other(u16),
}

impl HubErrorCode {
    /// Maps the numeric code from an `~ERROR` line.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::ParameterCount,
            2 => Self::NoSuchObject,
            3 => Self::InvalidAction,
            4 => Self::OutOfRange,
            5 => Self::Malformed,
            6 => Self::Unsupported,
            other => Self::Other(other),
        }
    }

    /// Returns the numeric wire code.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::ParameterCount => 1,
            Self::NoSuchObject => 2,
            Self::InvalidAction => 3,
            Self::OutOfRange => 4,
            Self::Malformed => 5,
            Self::Unsupported => 6,
            Self::Other(code) => *code,
        }
    }

    /// Human-readable description of the error code.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ParameterCount => "parameter count mismatch",
            Self::NoSuchObject => "object does not exist",
            Self::InvalidAction => "invalid action number",
            Self::OutOfRange => "parameter data out of range",
            Self::Malformed => "parameter data malformed",
            Self::Unsupported => "unsupported command",
            Self::Other(_) => "unknown error",
        }
    }
}

impl fmt::Display for HubErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

/// Errors related to protocol communication with the hub.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Opening the stream to the hub failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The hub rejected the credentials.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Login prompts did not arrive in time.
    #[error("login timed out after {0} ms")]
    LoginTimeout(u64),

    /// The connection is not in the ready state.
    #[error("not connected to hub")]
    NotConnected,

    /// No matching reply arrived in time.
    #[error("command `{command}` timed out after {timeout_ms} ms")]
    CommandTimeout {
        /// The command line that was sent.
        command: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The connection dropped while the command was pending.
    #[error("connection lost")]
    ConnectionLost,

    /// The hub answered with an explicit error line.
    #[error("hub rejected command: {0}")]
    HubRejected(HubErrorCode),

    /// A reply matched but could not be interpreted.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// A frame could not be decoded.
    #[error("framing error: {0}")]
    Framing(String),
}

impl ProtocolError {
    /// Whether this error should take the link down and trigger a reconnect.
    #[must_use]
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::ConnectionLost | Self::Framing(_)
        )
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::ConnectionFailed(err.to_string())
    }
}

/// Errors related to parsing hub lines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unexpected line format.
    #[error("unexpected line format: {0}")]
    UnexpectedFormat(String),

    /// A field is missing from the line.
    #[error("missing field in line: {0}")]
    MissingField(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

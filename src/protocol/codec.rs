// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line and prompt framing for the hub's telnet stream.
//!
//! The hub terminates replies with `\r\n` but prints its prompts (`login: `,
//! `password: `, `GNET> `) without a terminator, and a prompt may be followed
//! on the same physical line by the next monitoring message:
//!
//! ```text
//! GNET> ~OUTPUT,25,1,50.00\r\n
//! ```
//!
//! [`LipCodec`] splits such a stream into [`Frame::Prompt`] and
//! [`Frame::Line`] items. The prompt table is data, so firmware variants with
//! other prompt literals only need a new [`PromptPattern`].

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Line terminator expected by the hub.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Default upper bound for an unterminated line.
const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

/// Telnet "interpret as command" byte.
const IAC: u8 = 0xFF;

/// The kind of prompt printed by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Asking for the username.
    Login,
    /// Asking for the password.
    Password,
    /// Authenticated and waiting for commands.
    Ready,
}

/// A literal prompt the hub may print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPattern {
    /// Exact prompt text, without trailing whitespace.
    pub literal: &'static str,
    /// What the prompt means.
    pub kind: PromptKind,
}

/// Prompts printed by known hub firmware.
pub const DEFAULT_PROMPTS: &[PromptPattern] = &[
    PromptPattern {
        literal: "login:",
        kind: PromptKind::Login,
    },
    PromptPattern {
        literal: "password:",
        kind: PromptKind::Password,
    },
    // Caseta Smart Bridge Pro and RadioRA 2 main repeaters
    PromptPattern {
        literal: "GNET>",
        kind: PromptKind::Ready,
    },
    // HomeWorks QS processors
    PromptPattern {
        literal: "QNET>",
        kind: PromptKind::Ready,
    },
];

/// A decoded unit of the inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete, trimmed, non-empty line.
    Line(String),
    /// A prompt.
    Prompt(PromptKind),
}

/// Codec for the hub's line-oriented telnet session.
#[derive(Debug, Clone)]
pub struct LipCodec {
    prompts: Vec<PromptPattern>,
    max_line_length: usize,
}

impl LipCodec {
    /// Creates a codec with the default prompt table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prompts: DEFAULT_PROMPTS.to_vec(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Replaces the prompt table.
    #[must_use]
    pub fn with_prompts(mut self, prompts: impl Into<Vec<PromptPattern>>) -> Self {
        self.prompts = prompts.into();
        self
    }

    /// Sets the maximum length of an unterminated line.
    #[must_use]
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    fn leading_prompt(&self, src: &[u8]) -> Option<PromptPattern> {
        self.prompts
            .iter()
            .find(|p| src.starts_with(p.literal.as_bytes()))
            .copied()
    }

    fn is_partial_prompt(&self, src: &[u8]) -> bool {
        self.prompts
            .iter()
            .any(|p| p.literal.as_bytes().starts_with(src))
    }
}

impl Default for LipCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LipCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        loop {
            let padding = src
                .iter()
                .take_while(|b| matches!(b, b'\r' | b'\n' | b' ' | b'\t' | 0))
                .count();
            src.advance(padding);

            if src.is_empty() {
                return Ok(None);
            }

            // Telnet option negotiation (IAC WILL/WONT/DO/DONT <opt>) is ignored
            if src[0] == IAC {
                if src.len() < 2 {
                    return Ok(None);
                }
                match src[1] {
                    0xFB..=0xFE if src.len() < 3 => return Ok(None),
                    0xFB..=0xFE => src.advance(3),
                    _ => src.advance(2),
                }
                continue;
            }

            if let Some(prompt) = self.leading_prompt(src) {
                src.advance(prompt.literal.len());
                return Ok(Some(Frame::Prompt(prompt.kind)));
            }

            if let Some(pos) = src.iter().position(|b| *b == b'\n') {
                let raw = src.split_to(pos + 1);
                let text = String::from_utf8_lossy(&raw).trim().to_string();
                if text.is_empty() {
                    continue;
                }
                return Ok(Some(Frame::Line(text)));
            }

            if self.is_partial_prompt(src) {
                return Ok(None);
            }

            if src.len() > self.max_line_length {
                return Err(ProtocolError::Framing(format!(
                    "line exceeds {} bytes without terminator",
                    self.max_line_length
                )));
            }

            return Ok(None);
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split();
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Frame::Line(text)))
        }
    }
}

impl Encoder<String> for LipCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        if line.contains(['\r', '\n']) {
            return Err(ProtocolError::Framing(
                "outbound line must not contain a terminator".to_string(),
            ));
        }
        dst.reserve(line.len() + LINE_TERMINATOR.len());
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(LINE_TERMINATOR.as_bytes());
        Ok(())
    }
}

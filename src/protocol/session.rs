// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Login handshake and line stream of a single hub session.
//!
//! A session is one authenticated pass over one byte stream. It is generic
//! over the transport so the handshake can be exercised against in-memory
//! pipes as well as TCP sockets.

use std::fmt;
use std::time::Duration;

use futures::{SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::error::ProtocolError;
use crate::protocol::codec::{Frame, LipCodec, PromptKind};
use crate::protocol::duration_millis;

/// Default integration username.
pub const DEFAULT_USERNAME: &str = "lutron";

/// Default integration password.
pub const DEFAULT_PASSWORD: &str = "integration";

/// Lines that mean the hub refused the credentials, matched case-insensitively.
pub const LOGIN_REJECTIONS: &[&str] = &["login incorrect", "bad login", "invalid login"];

/// Integration login credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials from a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginStep {
    AwaitLogin,
    AwaitPassword,
    AwaitReady,
}

/// An authenticated session over a byte stream.
#[derive(Debug)]
pub struct Session<S> {
    framed: Framed<S, LipCodec>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Runs the prompt-driven login over `stream`.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed` if the hub asks for the login again or prints
    ///   a rejection line
    /// - `ConnectionFailed` if the stream closes during the handshake
    /// - `LoginTimeout` if the ready prompt does not arrive within `timeout`
    pub async fn establish(
        stream: S,
        codec: LipCodec,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, ProtocolError> {
        let mut framed = Framed::new(stream, codec);
        match tokio::time::timeout(timeout, handshake(&mut framed, credentials)).await {
            Ok(Ok(())) => Ok(Self { framed }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProtocolError::LoginTimeout(duration_millis(timeout))),
        }
    }

    /// Writes one line to the hub.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be written.
    pub async fn send_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        self.framed.send(line.to_string()).await
    }

    /// Consumes the session and yields its inbound lines.
    ///
    /// Prompts are dropped. The stream ends when the hub closes the
    /// connection and cannot be restarted.
    pub fn read_lines(self) -> impl Stream<Item = Result<String, ProtocolError>> {
        self.framed.filter_map(|frame| async move {
            match frame {
                Ok(Frame::Line(line)) => Some(Ok(line)),
                Ok(Frame::Prompt(_)) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }

    /// Returns the underlying framed transport.
    #[must_use]
    pub fn into_framed(self) -> Framed<S, LipCodec> {
        self.framed
    }
}

async fn handshake<S>(
    framed: &mut Framed<S, LipCodec>,
    credentials: &Credentials,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut step = LoginStep::AwaitLogin;

    loop {
        let frame = match framed.next().await {
            Some(frame) => frame?,
            None => {
                return Err(ProtocolError::ConnectionFailed(
                    "stream closed during login".to_string(),
                ));
            }
        };

        match (step, frame) {
            (_, Frame::Prompt(PromptKind::Ready)) => {
                tracing::debug!("login accepted");
                return Ok(());
            }
            (LoginStep::AwaitLogin, Frame::Prompt(PromptKind::Login)) => {
                tracing::trace!(username = %credentials.username, "sending username");
                framed.send(credentials.username.clone()).await?;
                step = LoginStep::AwaitPassword;
            }
            (LoginStep::AwaitPassword, Frame::Prompt(PromptKind::Password)) => {
                framed.send(credentials.password.clone()).await?;
                step = LoginStep::AwaitReady;
            }
            (LoginStep::AwaitPassword | LoginStep::AwaitReady, Frame::Prompt(PromptKind::Login)) => {
                return Err(ProtocolError::AuthenticationFailed);
            }
            (_, Frame::Prompt(kind)) => {
                tracing::trace!(?kind, ?step, "ignoring out-of-order prompt");
            }
            (_, Frame::Line(line)) if is_rejection(&line) => {
                tracing::debug!(%line, "hub rejected login");
                return Err(ProtocolError::AuthenticationFailed);
            }
            (_, Frame::Line(line)) => {
                tracing::trace!(%line, "login banner");
            }
        }
    }
}

fn is_rejection(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    LOGIN_REJECTIONS.iter().any(|literal| lower.contains(literal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    async fn expect_line(lines: &mut tokio::io::Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>, expected: &str) {
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, expected);
    }

    #[tokio::test]
    async fn logs_in_and_reads_lines() {
        let (client, server) = tokio::io::duplex(1024);
        let hub = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            write.write_all(b"login: ").await.unwrap();
            expect_line(&mut lines, "lutron").await;
            write.write_all(b"password: ").await.unwrap();
            expect_line(&mut lines, "integration").await;
            write.write_all(b"\r\nGNET> ").await.unwrap();
            expect_line(&mut lines, "?OUTPUT,1,1").await;
            write.write_all(b"~OUTPUT,1,1,0.00\r\nGNET> ").await.unwrap();
        });

        let mut session = Session::establish(
            client,
            LipCodec::new(),
            &Credentials::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        session.send_line("?OUTPUT,1,1").await.unwrap();

        let lines: Vec<String> = session
            .read_lines()
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(lines, vec!["~OUTPUT,1,1,0.00".to_string()]);
        hub.await.unwrap();
    }

    #[tokio::test]
    async fn login_reprompt_is_authentication_failure() {
        let (client, server) = tokio::io::duplex(1024);
        let hub = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            write.write_all(b"login: ").await.unwrap();
            expect_line(&mut lines, "lutron").await;
            write.write_all(b"password: ").await.unwrap();
            expect_line(&mut lines, "wrong").await;
            write.write_all(b"\r\nlogin: ").await.unwrap();
            lines
        });

        let result = Session::establish(
            client,
            LipCodec::new(),
            &Credentials::new("lutron", "wrong"),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::AuthenticationFailed)));
        drop(hub.await.unwrap());
    }

    #[tokio::test]
    async fn rejection_literal_is_authentication_failure() {
        let (client, mut server) = tokio::io::duplex(1024);
        server
            .write_all(b"login: \r\nLogin incorrect\r\n")
            .await
            .unwrap();

        let result = Session::establish(
            client,
            LipCodec::new(),
            &Credentials::default(),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::AuthenticationFailed)));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_hub_times_out() {
        let (client, _server) = tokio::io::duplex(1024);
        let result = Session::establish(
            client,
            LipCodec::new(),
            &Credentials::default(),
            Duration::from_secs(10),
        )
        .await;
        assert_eq!(result.unwrap_err(), ProtocolError::LoginTimeout(10_000));
    }

    #[tokio::test]
    async fn closed_stream_is_connection_failure() {
        let (client, server) = tokio::io::duplex(1024);
        drop(server);
        let result = Session::establish(
            client,
            LipCodec::new(),
            &Credentials::default(),
            Duration::from_secs(5),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::default());
        assert!(debug.contains("lutron"));
        assert!(!debug.contains("integration"));
    }
}

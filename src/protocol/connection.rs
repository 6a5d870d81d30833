// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistent TCP connection to a hub.
//!
//! A [`Connection`] owns the socket for the lifetime of the hub. A background
//! supervisor task reads frames and re-establishes the session with
//! exponential backoff when the link fails. Keep-alive probing is driven by
//! the [`Correlator`](super::Correlator), which calls [`Connection::reset`]
//! when a probe goes unanswered.
//! Dependents learn about the link through [`LinkEvent`]s:
//!
//! ```text
//! Line(..)* Lost Restored Line(..)* Lost ... Closed
//! ```
//!
//! Nothing written before a `Lost` is resent after `Restored`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc, watch};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::error::ProtocolError;
use crate::protocol::codec::{Frame, LipCodec};
use crate::protocol::session::Session;

type Writer = SplitSink<Framed<TcpStream, LipCodec>, String>;
type Reader = SplitStream<Framed<TcpStream, LipCodec>>;

/// Lifecycle of the hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket is open.
    Disconnected,
    /// Opening the socket.
    Connecting,
    /// Running the login handshake.
    Authenticating,
    /// Logged in; commands may be sent.
    Ready,
    /// The link failed and is being re-established.
    Reconnecting,
}

impl ConnectionState {
    /// Returns true if commands may be sent.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

/// Link-level notifications delivered to the connection's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// An inbound line.
    Line(String),
    /// The link failed; anything awaiting a reply will not get one.
    Lost,
    /// A new session is ready after a loss.
    Restored,
    /// The connection is closed for good.
    Closed,
}

enum SessionEnd {
    Shutdown,
    Failed(String),
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    writer: tokio::sync::Mutex<Option<Writer>>,
    last_outbound: parking_lot::Mutex<Instant>,
    write_failed: Notify,
    shutdown: CancellationToken,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::info!(from = %previous, to = %state, "connection state changed");
        }
    }

    async fn write(&self, line: &str) -> Result<(), ProtocolError> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(ProtocolError::NotConnected);
        };
        tracing::debug!(%line, "-> hub");
        match writer.send(line.to_string()).await {
            Ok(()) => {
                *self.last_outbound.lock() = Instant::now();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "write to hub failed");
                *guard = None;
                Err(ProtocolError::ConnectionLost)
            }
        }
    }

    async fn drop_writer(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.close().await;
        }
    }
}

/// Handle to the persistent hub connection.
///
/// Cloning is cheap; all clones share the socket.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Connects and logs in, then starts the supervisor task.
    ///
    /// Returns the handle and the receiver of link events. Dropping the
    /// receiver shuts the connection down.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed`, `AuthenticationFailed` or `LoginTimeout`
    /// if the first session cannot be established. No retry is attempted
    /// for the first session.
    pub async fn connect(
        config: HubConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LinkEvent>), ProtocolError> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            state,
            writer: tokio::sync::Mutex::new(None),
            last_outbound: parking_lot::Mutex::new(Instant::now()),
            write_failed: Notify::new(),
            shutdown: CancellationToken::new(),
        });

        let reader = match establish(&shared, &config, true).await {
            Ok(reader) => reader,
            Err(e) => {
                shared.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(supervise(Arc::clone(&shared), config, reader, events_tx));

        Ok((Self { shared }, events_rx))
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Returns a receiver that observes state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Writes one line, terminated with CRLF.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the connection is not ready
    /// - `Framing` if `line` contains a line terminator
    /// - `ConnectionLost` if the write fails; the supervisor then reconnects
    pub async fn send_line(&self, line: &str) -> Result<(), ProtocolError> {
        if !self.state().is_ready() {
            return Err(ProtocolError::NotConnected);
        }
        if line.contains(['\r', '\n']) {
            return Err(ProtocolError::Framing(
                "outbound line must not contain a terminator".to_string(),
            ));
        }
        let result = self.shared.write(line).await;
        if matches!(result, Err(ProtocolError::ConnectionLost)) {
            self.shared.write_failed.notify_one();
        }
        result
    }

    /// Returns when the last line was written.
    #[must_use]
    pub fn last_outbound(&self) -> Instant {
        *self.shared.last_outbound.lock()
    }

    /// Drops the current session and lets the supervisor reconnect.
    pub async fn reset(&self, reason: &str) {
        tracing::warn!(%reason, "resetting link to hub");
        self.shared.drop_writer().await;
        self.shared.write_failed.notify_one();
    }

    /// Closes the connection and stops reconnecting.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }

    /// Waits until the connection is closed for good.
    pub async fn closed(&self) {
        self.shared.shutdown.cancelled().await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn establish(
    shared: &Shared,
    config: &HubConfig,
    report_progress: bool,
) -> Result<Reader, ProtocolError> {
    if report_progress {
        shared.set_state(ConnectionState::Connecting);
    }
    tracing::debug!(host = %config.host(), port = config.port(), "opening connection");

    let address = (config.host(), config.port());
    let stream = match tokio::time::timeout(config.login_timeout(), TcpStream::connect(address)).await
    {
        Ok(stream) => stream?,
        Err(_) => {
            return Err(ProtocolError::ConnectionFailed(format!(
                "connect to {}:{} timed out",
                config.host(),
                config.port()
            )));
        }
    };
    // Command lines are tiny; don't let Nagle hold them back
    let _ = stream.set_nodelay(true);

    if report_progress {
        shared.set_state(ConnectionState::Authenticating);
    }
    let session = Session::establish(
        stream,
        config.codec(),
        config.credentials(),
        config.login_timeout(),
    )
    .await?;

    let (writer, reader) = session.into_framed().split();
    *shared.writer.lock().await = Some(writer);
    *shared.last_outbound.lock() = Instant::now();
    shared.set_state(ConnectionState::Ready);
    Ok(reader)
}

async fn supervise(
    shared: Arc<Shared>,
    config: HubConfig,
    mut reader: Reader,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    loop {
        match run_session(&shared, &mut reader, &events).await {
            SessionEnd::Shutdown => break,
            SessionEnd::Failed(reason) => {
                tracing::warn!(%reason, "link to hub lost");
                shared.drop_writer().await;
                shared.set_state(ConnectionState::Reconnecting);
                if events.send(LinkEvent::Lost).is_err() {
                    break;
                }
                match reconnect(&shared, &config).await {
                    Some(next) => {
                        reader = next;
                        if events.send(LinkEvent::Restored).is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    shared.drop_writer().await;
    shared.set_state(ConnectionState::Disconnected);
    shared.shutdown.cancel();
    let _ = events.send(LinkEvent::Closed);
    tracing::info!("connection closed");
}

async fn run_session(
    shared: &Shared,
    reader: &mut Reader,
    events: &mpsc::UnboundedSender<LinkEvent>,
) -> SessionEnd {
    loop {
        tokio::select! {
            () = shared.shutdown.cancelled() => return SessionEnd::Shutdown,

            () = shared.write_failed.notified() => {
                // A stale notification from an earlier session leaves the new writer in place
                if shared.writer.lock().await.is_none() {
                    return SessionEnd::Failed("writer closed".to_string());
                }
            }

            frame = reader.next() => match frame {
                Some(Ok(frame)) => {
                    if let Frame::Line(line) = frame {
                        tracing::debug!(%line, "<- hub");
                        if events.send(LinkEvent::Line(line)).is_err() {
                            return SessionEnd::Shutdown;
                        }
                    }
                }
                Some(Err(e)) => return SessionEnd::Failed(e.to_string()),
                None => return SessionEnd::Failed("stream closed by hub".to_string()),
            },
        }
    }
}

async fn reconnect(shared: &Shared, config: &HubConfig) -> Option<Reader> {
    let policy = config.reconnection();
    let mut attempt = 0u32;

    loop {
        if !policy.should_retry(attempt) {
            tracing::warn!(attempts = attempt, "giving up on reconnecting to hub");
            return None;
        }

        let delay: Duration = policy.delay_for_attempt(attempt);
        tokio::select! {
            () = shared.shutdown.cancelled() => return None,
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;

        let result = tokio::select! {
            () = shared.shutdown.cancelled() => return None,
            result = establish(shared, config, false) => result,
        };
        match result {
            Ok(reader) => {
                tracing::info!(attempt, "reconnected to hub");
                return Some(reader);
            }
            Err(e) => tracing::warn!(attempt, error = %e, "reconnect attempt failed"),
        }
    }
}

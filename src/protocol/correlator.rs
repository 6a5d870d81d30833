// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command/reply correlation on the shared line stream.
//!
//! The hub has no request ids: a reply is just the next `~OUTPUT` line for
//! the zone, indistinguishable from a state push. The [`Correlator`] keeps
//! exactly one command outstanding, so the first line matching that
//! command's [`ReplyMatcher`] is its reply.
//!
//! Every inbound line is handed to the [`NotificationHandler`] before it is
//! checked against the pending command, so zone state stays current even for
//! lines that complete a command.
//!
//! When the link is lost, the pending command and every command still
//! waiting for its turn fail with [`ProtocolError::ConnectionLost`], and
//! the handler's [`link_lost`](NotificationHandler::link_lost) runs before
//! any line of the next session is dispatched.
//!
//! Keep-alive probes take their turn in the same queue as every other
//! command, so a probe's reply can never complete someone else's command.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::command::{Command, OutputCommand};
use crate::config::KeepAlivePolicy;
use crate::error::ProtocolError;
use crate::protocol::connection::{Connection, ConnectionState, LinkEvent};
use crate::protocol::duration_millis;
use crate::protocol::message::HubMessage;
use crate::protocol::reply::ReplyMatcher;

/// Receives every inbound message before reply matching.
pub trait NotificationHandler: Send + Sync {
    /// Handles one decoded inbound message.
    fn handle(&self, message: &HubMessage);

    /// Called once per link loss, after pending commands have failed.
    fn link_lost(&self) {}
}

impl<F> NotificationHandler for F
where
    F: Fn(&HubMessage) + Send + Sync,
{
    fn handle(&self, message: &HubMessage) {
        self(message);
    }
}

/// Sends output commands and resolves their replies.
///
/// This is the seam between fade scheduling and the wire, so fades can be
/// driven against a scripted executor in tests.
pub trait CommandExecutor: Send + Sync + 'static {
    /// Sends `command` and returns the line that answered it.
    fn execute(
        &self,
        command: OutputCommand,
    ) -> impl Future<Output = Result<String, ProtocolError>> + Send;
}

struct PendingCommand {
    id: u64,
    line: String,
    matcher: ReplyMatcher,
    issued_at: Instant,
    reply: oneshot::Sender<Result<String, ProtocolError>>,
}

/// Holds the single outstanding command.
#[derive(Default)]
struct PendingSlot {
    slot: parking_lot::Mutex<Option<PendingCommand>>,
}

impl PendingSlot {
    fn install(&self, command: PendingCommand) {
        *self.slot.lock() = Some(command);
    }

    /// Resolves the pending command if `line` answers it.
    fn complete(&self, line: &str, message: &HubMessage) {
        let mut slot = self.slot.lock();
        let Some(pending) = slot.as_ref() else {
            return;
        };

        let outcome = match message {
            HubMessage::Error(code) => Err(ProtocolError::HubRejected(*code)),
            _ if pending.matcher.matches(line) => Ok(line.to_string()),
            _ => return,
        };

        if let Some(pending) = slot.take() {
            tracing::debug!(
                id = pending.id,
                command = %pending.line,
                elapsed_ms = duration_millis(pending.issued_at.elapsed()),
                ok = outcome.is_ok(),
                "command completed"
            );
            let _ = pending.reply.send(outcome);
        }
    }

    fn fail(&self, error: &ProtocolError) {
        if let Some(pending) = self.slot.lock().take() {
            tracing::debug!(id = pending.id, command = %pending.line, %error, "failing pending command");
            let _ = pending.reply.send(Err(error.clone()));
        }
    }

    fn clear(&self, id: u64) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|p| p.id == id) {
            slot.take();
        }
    }
}

struct Inner {
    connection: Connection,
    queue: tokio::sync::Mutex<()>,
    pending: PendingSlot,
    epoch: watch::Sender<u64>,
    next_id: AtomicU64,
    default_timeout: Duration,
}

impl Inner {
    fn fail_all(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
        self.pending.fail(&ProtocolError::ConnectionLost);
    }
}

/// Serialises commands over a [`Connection`] and matches their replies.
///
/// Cloning is cheap; all clones share the same queue.
#[derive(Clone)]
pub struct Correlator {
    inner: Arc<Inner>,
}

impl Correlator {
    /// Starts the dispatch loop over the connection's link events, and the
    /// keep-alive loop when `keepalive` is enabled.
    #[must_use]
    pub fn start<H>(
        connection: Connection,
        events: mpsc::UnboundedReceiver<LinkEvent>,
        handler: Arc<H>,
        default_timeout: Duration,
        keepalive: KeepAlivePolicy,
    ) -> Self
    where
        H: NotificationHandler + ?Sized + 'static,
    {
        let (epoch, _) = watch::channel(0);
        let inner = Arc::new(Inner {
            connection,
            queue: tokio::sync::Mutex::new(()),
            pending: PendingSlot::default(),
            epoch,
            next_id: AtomicU64::new(1),
            default_timeout,
        });
        tokio::spawn(dispatch(Arc::clone(&inner), events, handler));
        let correlator = Self { inner };
        if keepalive.enabled {
            tokio::spawn(keep_alive(correlator.clone(), keepalive));
        }
        correlator
    }

    /// Returns the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Sends a typed command with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`execute_raw`](Self::execute_raw).
    pub async fn send_command<C: Command + Sync>(&self, command: &C) -> Result<String, ProtocolError> {
        self.execute_raw(
            &command.to_line(),
            command.reply_matcher(),
            self.inner.default_timeout,
        )
        .await
    }

    /// Sends `line` once it is this caller's turn and waits for the first
    /// inbound line accepted by `matcher`.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the link is not ready
    /// - `CommandTimeout` if no matching line arrives within `timeout`
    /// - `HubRejected` if the hub answers with `~ERROR`
    /// - `ConnectionLost` if the link fails while waiting
    pub async fn execute_raw(
        &self,
        line: &str,
        matcher: ReplyMatcher,
        timeout: Duration,
    ) -> Result<String, ProtocolError> {
        let inner = &self.inner;
        let mut epoch_rx = inner.epoch.subscribe();
        let epoch = *epoch_rx.borrow_and_update();

        let _turn = tokio::select! {
            turn = inner.queue.lock() => turn,
            _ = epoch_rx.changed() => return Err(ProtocolError::ConnectionLost),
        };

        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        inner.pending.install(PendingCommand {
            id,
            line: line.to_string(),
            matcher,
            issued_at: Instant::now(),
            reply: tx,
        });
        if *inner.epoch.borrow() != epoch {
            inner.pending.clear(id);
            return Err(ProtocolError::ConnectionLost);
        }

        if let Err(e) = inner.connection.send_line(line).await {
            inner.pending.clear(id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ProtocolError::ChannelClosed(
                "dispatch loop stopped".to_string(),
            )),
            Err(_) => {
                inner.pending.clear(id);
                tracing::debug!(id, command = %line, "command timed out");
                Err(ProtocolError::CommandTimeout {
                    command: line.to_string(),
                    timeout_ms: duration_millis(timeout),
                })
            }
        }
    }
}

impl CommandExecutor for Correlator {
    fn execute(
        &self,
        command: OutputCommand,
    ) -> impl Future<Output = Result<String, ProtocolError>> + Send {
        let this = self.clone();
        async move { this.send_command(&command).await }
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("connection", &self.inner.connection)
            .field("default_timeout", &self.inner.default_timeout)
            .finish_non_exhaustive()
    }
}

async fn dispatch<H>(
    inner: Arc<Inner>,
    mut events: mpsc::UnboundedReceiver<LinkEvent>,
    handler: Arc<H>,
) where
    H: NotificationHandler + ?Sized,
{
    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::Line(line) => {
                let message = HubMessage::parse(&line).unwrap_or_else(|e| {
                    tracing::warn!(%line, error = %e, "malformed hub line");
                    HubMessage::Other(line.clone())
                });
                tracing::trace!(?message, "dispatching");
                handler.handle(&message);
                inner.pending.complete(&line, &message);
            }
            LinkEvent::Lost => {
                inner.fail_all();
                handler.link_lost();
            }
            LinkEvent::Restored => tracing::debug!("link restored, accepting commands"),
            LinkEvent::Closed => {
                inner.fail_all();
                handler.link_lost();
                break;
            }
        }
    }
    tracing::debug!("dispatch loop finished");
}

/// Probes the link after `policy.idle` without outbound traffic.
///
/// Any answer to the probe, `~ERROR` included, proves the link alive. No
/// answer within `policy.grace` resets the connection.
async fn keep_alive(correlator: Correlator, policy: KeepAlivePolicy) {
    let connection = correlator.connection().clone();
    let mut state = connection.watch_state();
    let matcher = ReplyMatcher::query_reply(&policy.probe);

    loop {
        let ready = tokio::select! {
            () = connection.closed() => break,
            ready = state.wait_for(ConnectionState::is_ready) => ready.is_ok(),
        };
        if !ready {
            break;
        }

        tokio::select! {
            () = connection.closed() => break,
            () = tokio::time::sleep_until(connection.last_outbound() + policy.idle) => {}
        }
        if connection.last_outbound().elapsed() < policy.idle {
            continue;
        }

        tracing::trace!(probe = %policy.probe, "link idle, probing");
        match correlator
            .execute_raw(&policy.probe, matcher.clone(), policy.grace)
            .await
        {
            Ok(_) | Err(ProtocolError::HubRejected(_)) => {}
            Err(ProtocolError::CommandTimeout { .. }) => {
                connection
                    .reset(&format!("no reply to keep-alive within {:?}", policy.grace))
                    .await;
                let _ = state.changed().await;
            }
            Err(error) => {
                tracing::debug!(%error, "keep-alive probe not sent");
                let _ = state.changed().await;
            }
        }
    }
    tracing::debug!("keep-alive loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HubErrorCode;
    use crate::types::ZoneId;

    type ReplyRx = oneshot::Receiver<Result<String, ProtocolError>>;

    fn install(slot: &PendingSlot, id: u64, matcher: ReplyMatcher) -> ReplyRx {
        let (tx, rx) = oneshot::channel();
        slot.install(PendingCommand {
            id,
            line: "?OUTPUT,2,1".to_string(),
            matcher,
            issued_at: Instant::now(),
            reply: tx,
        });
        rx
    }

    fn offer(slot: &PendingSlot, line: &str) {
        let message = HubMessage::parse(line).unwrap();
        slot.complete(line, &message);
    }

    #[test]
    fn unrelated_push_leaves_command_pending() {
        let slot = PendingSlot::default();
        let mut rx = install(&slot, 1, ReplyMatcher::output_level(ZoneId::new(2).unwrap()));

        offer(&slot, "~OUTPUT,25,1,10.00");
        assert!(rx.try_recv().is_err());

        offer(&slot, "~OUTPUT,2,1,10.00");
        assert_eq!(rx.try_recv().unwrap(), Ok("~OUTPUT,2,1,10.00".to_string()));
    }

    #[test]
    fn error_line_rejects_pending_command() {
        let slot = PendingSlot::default();
        let mut rx = install(&slot, 1, ReplyMatcher::AnyLine);

        offer(&slot, "~ERROR,6");
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(ProtocolError::HubRejected(HubErrorCode::Unsupported))
        );
    }

    #[test]
    fn fail_resolves_with_error() {
        let slot = PendingSlot::default();
        let mut rx = install(&slot, 1, ReplyMatcher::AnyLine);

        slot.fail(&ProtocolError::ConnectionLost);
        assert_eq!(rx.try_recv().unwrap(), Err(ProtocolError::ConnectionLost));
    }

    #[test]
    fn clear_ignores_other_ids() {
        let slot = PendingSlot::default();
        let mut rx = install(&slot, 7, ReplyMatcher::AnyLine);

        slot.clear(3);
        offer(&slot, "~OUTPUT,1,1,0.00");
        assert!(rx.try_recv().unwrap().is_ok());

        let mut rx = install(&slot, 8, ReplyMatcher::AnyLine);
        slot.clear(8);
        offer(&slot, "~OUTPUT,1,1,0.00");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closure_is_a_notification_handler() {
        let seen = parking_lot::Mutex::new(Vec::new());
        let handler = |message: &HubMessage| seen.lock().push(message.clone());
        handler.handle(&HubMessage::Other("x".to_string()));
        assert_eq!(seen.lock().len(), 1);
    }
}

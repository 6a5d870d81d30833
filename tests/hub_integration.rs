// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests against an in-process mock Lutron hub.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use lipfade::{
    Brightness, ConnectionState, Error, FadeDuration, FadeState, Hub, HubConfig, HubErrorCode,
    HubEvent, KeepAlivePolicy, ProtocolError, ReconnectionPolicy, ZoneConfig, ZoneId,
    config::HubConfigBuilder,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

const USERNAME: &str = "lutron";
const PASSWORD: &str = "integration";

/// Zone the mock never answers for.
const SILENT_ZONE: u32 = 77;
/// Zone the mock rejects with `~ERROR,2`.
const MISSING_ZONE: u32 = 999;
/// Integration id of the bridge itself: rejected with `~ERROR,2` after a
/// short delay, like the default keep-alive probe on a Caseta bridge.
const BRIDGE_ID: u32 = 1;

/// A minimal LIP hub: telnet-style login, then `#OUTPUT`/`?OUTPUT`.
#[derive(Clone)]
struct MockHub {
    port: u16,
    received: Arc<parking_lot::Mutex<Vec<String>>>,
    levels: Arc<parking_lot::Mutex<HashMap<u32, u8>>>,
    muted: Arc<AtomicBool>,
    logins: Arc<AtomicUsize>,
    kick: broadcast::Sender<()>,
}

impl MockHub {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (kick, _) = broadcast::channel(4);
        let hub = Self {
            port: listener.local_addr().unwrap().port(),
            received: Arc::default(),
            levels: Arc::default(),
            muted: Arc::default(),
            logins: Arc::default(),
            kick,
        };

        let server = hub.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let session = server.clone();
                tokio::spawn(async move {
                    let _ = session.serve(stream).await;
                });
            }
        });
        hub
    }

    async fn serve(self, stream: TcpStream) -> std::io::Result<()> {
        let mut kicked = self.kick.subscribe();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        write.write_all(b"login: ").await?;
        let username = lines.next_line().await?.unwrap_or_default();
        write.write_all(b"password: ").await?;
        let password = lines.next_line().await?.unwrap_or_default();
        if username.trim() != USERNAME || password.trim() != PASSWORD {
            write.write_all(b"login incorrect\r\nlogin: ").await?;
            return Ok(());
        }
        self.logins.fetch_add(1, Ordering::SeqCst);
        write.write_all(b"\r\nGNET> ").await?;

        loop {
            let line = tokio::select! {
                _ = kicked.recv() => return Ok(()),
                line = lines.next_line() => match line? {
                    Some(line) => line.trim().to_string(),
                    None => return Ok(()),
                },
            };
            self.received.lock().push(line.clone());
            if self.muted.load(Ordering::SeqCst) {
                continue;
            }
            if line.starts_with(&format!("?OUTPUT,{BRIDGE_ID},")) {
                sleep(Duration::from_millis(50)).await;
            }
            if let Some(reply) = self.reply_to(&line) {
                write.write_all(format!("{reply}\r\nGNET> ").as_bytes()).await?;
            }
        }
    }

    fn reply_to(&self, line: &str) -> Option<String> {
        let fields: Vec<&str> = line.get(1..)?.split(',').collect();
        if fields.first() != Some(&"OUTPUT") {
            return Some("~ERROR,6".to_string());
        }
        let zone: u32 = fields.get(1)?.parse().ok()?;
        match zone {
            SILENT_ZONE => return None,
            MISSING_ZONE | BRIDGE_ID => return Some("~ERROR,2".to_string()),
            _ => {}
        }

        let mut levels = self.levels.lock();
        if line.starts_with('#') {
            levels.insert(zone, fields.get(3)?.parse().ok()?);
        }
        let level = levels.get(&zone).copied().unwrap_or(0);
        Some(format!("~OUTPUT,{zone},1,{level}.00"))
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    fn set_level(&self, zone: u32, level: u8) {
        self.levels.lock().insert(zone, level);
    }

    fn drop_connections(&self) {
        let _ = self.kick.send(());
    }
}

fn zone(id: u32) -> ZoneId {
    ZoneId::new(id).unwrap()
}

fn pct(value: u8) -> Brightness {
    Brightness::new(value).unwrap()
}

fn config(mock: &MockHub) -> HubConfigBuilder {
    HubConfig::builder()
        .host("127.0.0.1")
        .port(mock.port)
        .command_timeout(Duration::from_secs(2))
        .keepalive(KeepAlivePolicy::disabled())
        .reconnection(
            ReconnectionPolicy::new()
                .with_initial_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_millis(400)),
        )
        .zone(ZoneConfig::new(zone(28), "Bedroom"))
        .zone(ZoneConfig::new(zone(5), "Kitchen"))
        .zone(ZoneConfig::new(zone(SILENT_ZONE), "Attic"))
        .zone(ZoneConfig::new(zone(MISSING_ZONE), "Ghost"))
}

async fn connect(mock: &MockHub) -> Hub {
    Hub::configure(config(mock).build().unwrap()).await.unwrap()
}

async fn wait_for_state(hub: &Hub, state: ConnectionState) {
    let mut watch = hub.watch_connection();
    timeout(Duration::from_secs(5), watch.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("connection never reached {state}"))
        .unwrap();
}

// ============================================================================
// Login
// ============================================================================

mod login {
    use super::*;

    #[tokio::test]
    async fn logs_in_with_default_credentials() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        assert_eq!(hub.connection_state(), ConnectionState::Ready);
        assert_eq!(mock.logins.load(Ordering::SeqCst), 1);
        assert_eq!(hub.zones().len(), 4);
        hub.shutdown();
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let mock = MockHub::start().await;
        let config = config(&mock)
            .credentials(USERNAME, "nope")
            .build()
            .unwrap();

        let result = Hub::configure(config).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::AuthenticationFailed))
        ));
    }

    #[tokio::test]
    async fn refused_connection_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = HubConfig::builder()
            .host("127.0.0.1")
            .port(port)
            .build()
            .unwrap();
        let result = Hub::configure(config).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::ConnectionFailed(_)))
        ));
    }
}

// ============================================================================
// Fades
// ============================================================================

mod fades {
    use super::*;

    #[tokio::test]
    async fn short_fade_is_one_command() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        let handle = hub
            .request_fade(zone(28), pct(100), FadeDuration::from_seconds(1))
            .unwrap();
        assert_eq!(handle.finished().await, FadeState::Completed);

        assert_eq!(mock.received(), vec!["#OUTPUT,28,1,100,1"]);
        assert_eq!(hub.zone(zone(28)).unwrap().brightness, Some(pct(100)));
        hub.shutdown();
    }

    #[tokio::test]
    async fn fade_longer_than_cap_is_chunked() {
        let mock = MockHub::start().await;
        mock.set_level(28, 100);
        let config = config(&mock)
            .fade_cap(FadeDuration::from_seconds(2))
            .build()
            .unwrap();
        let hub = Hub::configure(config).await.unwrap();

        let handle = hub
            .request_fade(zone(28), pct(0), FadeDuration::from_seconds(5))
            .unwrap();
        assert_eq!(handle.finished().await, FadeState::Completed);

        assert_eq!(
            mock.received(),
            vec![
                "?OUTPUT,28,1",
                "#OUTPUT,28,1,60,2",
                "#OUTPUT,28,1,20,2",
                "#OUTPUT,28,1,0,1",
            ]
        );
        hub.shutdown();
    }

    #[tokio::test]
    async fn newer_request_supersedes() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        let first = hub
            .request_fade(zone(5), pct(100), FadeDuration::from_seconds(30))
            .unwrap();
        let second = hub
            .request_fade(zone(5), pct(0), FadeDuration::from_seconds(1))
            .unwrap();

        assert_eq!(second.finished().await, FadeState::Completed);
        assert_eq!(first.state(), FadeState::Superseded);
        assert_eq!(
            mock.received().last().map(String::as_str),
            Some("#OUTPUT,5,1,0,1")
        );
        assert!(hub.fade_session(zone(5)).is_none());
        hub.shutdown();
    }

    #[tokio::test]
    async fn cancel_holds_the_zone() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        let handle = hub
            .request_fade(zone(5), pct(80), FadeDuration::from_seconds(60))
            .unwrap();
        sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.state(), FadeState::Running);

        let cancelled = hub.cancel_fade(zone(5)).await.unwrap();
        assert_eq!(cancelled, Some(handle.id()));
        assert_eq!(handle.finished().await, FadeState::Cancelled);

        let level = hub.zone(zone(5)).unwrap().brightness.unwrap();
        assert_eq!(
            mock.received().last().cloned(),
            Some(format!("#OUTPUT,5,1,{},0", level.value()))
        );
        hub.shutdown();
    }

    #[tokio::test]
    async fn cancel_stops_near_the_start_of_a_long_fade() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;
        hub.set_level(zone(5), pct(0), FadeDuration::IMMEDIATE)
            .await
            .unwrap();

        let handle = hub
            .request_fade(zone(5), pct(80), FadeDuration::from_seconds(3600))
            .unwrap();
        sleep(Duration::from_millis(200)).await;
        // The acknowledgement reported the fade's end level
        assert_eq!(hub.zone(zone(5)).unwrap().brightness, Some(pct(80)));

        hub.cancel_fade(zone(5)).await.unwrap();
        assert_eq!(handle.finished().await, FadeState::Cancelled);
        assert_eq!(
            mock.received(),
            vec!["#OUTPUT,5,1,0,0", "#OUTPUT,5,1,80,3600", "#OUTPUT,5,1,0,0"]
        );
        hub.shutdown();
    }

    #[tokio::test]
    async fn unknown_zone_is_refused() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        let result = hub.request_fade(zone(3), pct(10), FadeDuration::IMMEDIATE);
        assert!(matches!(result, Err(Error::ZoneNotFound(z)) if z == zone(3)));
        hub.shutdown();
    }
}

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn set_and_query_level() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        hub.set_level(zone(28), pct(40), FadeDuration::from_seconds(2))
            .await
            .unwrap();
        assert_eq!(hub.query_level(zone(28)).await.unwrap(), pct(40));
        assert_eq!(mock.received(), vec!["#OUTPUT,28,1,40,2", "?OUTPUT,28,1"]);
        hub.shutdown();
    }

    #[tokio::test]
    async fn set_level_rejects_fades_over_cap() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        let result = hub
            .set_level(zone(28), pct(40), FadeDuration::from_seconds(7201))
            .await;
        assert!(matches!(
            result,
            Err(Error::Value(lipfade::ValueError::FadeTooLong { .. }))
        ));
        assert!(mock.received().is_empty());
        hub.shutdown();
    }

    #[tokio::test]
    async fn hub_error_fails_the_command() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        let result = hub
            .set_level(zone(MISSING_ZONE), pct(50), FadeDuration::IMMEDIATE)
            .await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::HubRejected(
                HubErrorCode::NoSuchObject
            )))
        ));
        hub.shutdown();
    }

    #[tokio::test]
    async fn silent_hub_times_out() {
        let mock = MockHub::start().await;
        let config = config(&mock)
            .command_timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let hub = Hub::configure(config).await.unwrap();

        let result = hub.query_level(zone(SILENT_ZONE)).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::CommandTimeout { .. }))
        ));
        // The next command is not confused by the missing reply
        assert_eq!(hub.query_level(zone(28)).await.unwrap(), pct(0));
        hub.shutdown();
    }

    #[tokio::test]
    async fn discovered_zones_can_be_faded() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        let report = hub.discover_zones("[Zones]\n12, Porch, SWITCH\n13\n");
        assert_eq!(report.zones.len(), 1);
        assert_eq!(report.skipped_count(), 1);

        let handle = hub
            .request_fade(zone(12), pct(100), FadeDuration::IMMEDIATE)
            .unwrap();
        assert_eq!(handle.finished().await, FadeState::Completed);
        assert_eq!(mock.received(), vec!["#OUTPUT,12,1,100,0"]);
        hub.shutdown();
    }
}

// ============================================================================
// Link failures
// ============================================================================

mod link {
    use super::*;

    #[tokio::test]
    async fn connection_loss_fails_every_pending_command() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;
        let mut events = hub.subscribe();

        let fade = hub
            .request_fade(zone(28), pct(100), FadeDuration::from_seconds(60))
            .unwrap();
        sleep(Duration::from_millis(100)).await;

        let pending: Vec<_> = (0..3)
            .map(|_| {
                let hub = hub.clone();
                tokio::spawn(async move { hub.query_level(zone(SILENT_ZONE)).await })
            })
            .collect();
        sleep(Duration::from_millis(200)).await;

        mock.drop_connections();

        for task in pending {
            let result = task.await.unwrap();
            assert!(
                matches!(result, Err(Error::Protocol(ProtocolError::ConnectionLost))),
                "{result:?}"
            );
        }
        assert_eq!(fade.finished().await, FadeState::Failed);
        assert_eq!(
            fade.snapshot().error,
            Some(ProtocolError::ConnectionLost)
        );

        wait_for_state(&hub, ConnectionState::Ready).await;
        assert_eq!(mock.logins.load(Ordering::SeqCst), 2);
        hub.set_level(zone(28), pct(10), FadeDuration::IMMEDIATE)
            .await
            .unwrap();

        let mut seen_reconnecting = false;
        let mut fade_failures = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                HubEvent::ConnectionChanged {
                    state: ConnectionState::Reconnecting,
                } => seen_reconnecting = true,
                HubEvent::FadeFailed { .. } => fade_failures += 1,
                _ => {}
            }
        }
        assert!(seen_reconnecting);
        assert_eq!(fade_failures, 1);
        hub.shutdown();
    }

    #[tokio::test]
    async fn unanswered_keepalive_reconnects() {
        let mock = MockHub::start().await;
        mock.muted.store(true, Ordering::SeqCst);
        let config = config(&mock)
            .command_timeout(Duration::from_millis(100))
            .keepalive(
                KeepAlivePolicy::new()
                    .with_idle(Duration::from_millis(300))
                    .with_grace(Duration::from_millis(200)),
            )
            .reconnection(ReconnectionPolicy::new().with_initial_delay(Duration::from_millis(300)))
            .build()
            .unwrap();
        let hub = Hub::configure(config).await.unwrap();

        wait_for_state(&hub, ConnectionState::Reconnecting).await;
        assert!(mock.received().iter().any(|line| line == "?OUTPUT,1,1"));

        mock.muted.store(false, Ordering::SeqCst);
        wait_for_state(&hub, ConnectionState::Ready).await;
        assert!(mock.logins.load(Ordering::SeqCst) >= 2);
        hub.shutdown();
    }

    #[tokio::test]
    async fn rejected_keepalive_does_not_fail_the_next_command() {
        let mock = MockHub::start().await;
        let config = config(&mock)
            .command_timeout(Duration::from_millis(200))
            .keepalive(
                KeepAlivePolicy::new()
                    .with_idle(Duration::from_millis(300))
                    .with_grace(Duration::from_secs(1)),
            )
            .build()
            .unwrap();
        let hub = Hub::configure(config).await.unwrap();

        timeout(Duration::from_secs(5), async {
            while !mock.received().iter().any(|line| line == "?OUTPUT,1,1") {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("keep-alive was never sent");

        // The bridge is still answering the probe with ~ERROR
        hub.set_level(zone(5), pct(40), FadeDuration::IMMEDIATE)
            .await
            .unwrap();
        assert_eq!(hub.zone(zone(5)).unwrap().brightness, Some(pct(40)));

        let received = mock.received();
        let probe = received.iter().position(|line| line == "?OUTPUT,1,1");
        let command = received.iter().position(|line| line == "#OUTPUT,5,1,40,0");
        assert!(probe < command, "{received:?}");
        assert_eq!(hub.connection_state(), ConnectionState::Ready);
        assert_eq!(mock.logins.load(Ordering::SeqCst), 1);
        hub.shutdown();
    }

    #[tokio::test]
    async fn fade_started_after_reconnect_survives() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        let before = hub
            .request_fade(zone(28), pct(100), FadeDuration::from_seconds(60))
            .unwrap();
        sleep(Duration::from_millis(100)).await;

        let mut state = hub.watch_connection();
        mock.drop_connections();
        timeout(Duration::from_secs(5), state.wait_for(|s| !s.is_ready()))
            .await
            .unwrap()
            .unwrap();
        wait_for_state(&hub, ConnectionState::Ready).await;

        let after = hub
            .request_fade(zone(28), pct(0), FadeDuration::from_seconds(1))
            .unwrap();
        assert_eq!(after.finished().await, FadeState::Completed);
        assert_eq!(before.state(), FadeState::Failed);
        hub.shutdown();
    }

    #[tokio::test]
    async fn shutdown_stops_everything() {
        let mock = MockHub::start().await;
        let hub = connect(&mock).await;

        let fade = hub
            .request_fade(zone(28), pct(100), FadeDuration::from_seconds(60))
            .unwrap();
        hub.shutdown();

        assert_eq!(fade.finished().await, FadeState::Cancelled);
        wait_for_state(&hub, ConnectionState::Disconnected).await;
        assert!(matches!(
            hub.request_fade(zone(28), pct(0), FadeDuration::IMMEDIATE),
            Err(Error::ShutDown)
        ));
    }
}

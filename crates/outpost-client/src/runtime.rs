//! The client runtime task.
//!
//! One task owns the connection. It dials with backoff, sends the
//! handshake, then loops over inbound records, records queued by the game
//! layer, health signals and the shutdown flag. A per-session health task
//! emits a ping every `health_interval` and reports the session stale
//! once nothing has been heard for `liveness_timeout`; the runtime then
//! drops the connection and redials.
//!
//! Settlement records go to the [`ReconcilerHandle`]. Everything else
//! becomes a [`ClientEvent`]. A `Disconnect│reason` from the server ends
//! the runtime without redialing.

use std::time::Duration;

use outpost_protocol::{Codec, DelimitedCodec, DisconnectReason, PeerRecord, ServerRecord};
use outpost_settlement::ReconcilerHandle;
use outpost_transport::{Connection, WebSocketConnection};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{Backoff, ClientConfig, ClientError, ClientEvent};

// ---------------------------------------------------------------------------
// Public handle
// ---------------------------------------------------------------------------

/// A running client.
///
/// Dropping it stops the runtime at its next loop iteration.
pub struct OutpostClient {
    outbound: mpsc::UnboundedSender<PeerRecord>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<DisconnectReason, ClientError>>,
}

impl OutpostClient {
    /// Starts the runtime. Settlement records are applied to `reconciler`.
    pub fn spawn(config: ClientConfig, reconciler: ReconcilerHandle) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let runtime = Runtime {
            config: config.validated(),
            reconciler,
            codec: DelimitedCodec::default(),
            outbound: outbound_rx,
            events: events_tx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(runtime.run());

        Self {
            outbound,
            events,
            shutdown,
            task,
        }
    }

    /// Queues a record for the server. Records queued while the runtime
    /// is redialing go out once the new session is up.
    pub fn send(&self, record: PeerRecord) -> Result<(), ClientError> {
        self.outbound.send(record).map_err(|_| ClientError::Stopped)
    }

    /// The next event, or `None` once the runtime has stopped.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Asks the runtime to close the connection and waits for it.
    pub async fn shutdown(self) -> Result<DisconnectReason, ClientError> {
        self.shutdown.send_replace(true);
        self.join().await
    }

    /// Waits for the runtime to end on its own.
    ///
    /// Returns the reason the server gave, or [`DisconnectReason::Closing`]
    /// after a local shutdown.
    pub async fn join(self) -> Result<DisconnectReason, ClientError> {
        self.task.await.map_err(|_| ClientError::Stopped)?
    }
}

// ---------------------------------------------------------------------------
// Runtime task
// ---------------------------------------------------------------------------

enum SessionEnd {
    /// The server or the local side ended the session for good.
    Ended(DisconnectReason),
    /// The connection dropped or went silent.
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HealthSignal {
    Ping,
    Stale,
}

struct Runtime {
    config: ClientConfig,
    reconciler: ReconcilerHandle,
    codec: DelimitedCodec,
    outbound: mpsc::UnboundedReceiver<PeerRecord>,
    events: mpsc::UnboundedSender<ClientEvent>,
    shutdown: watch::Receiver<bool>,
}

impl Runtime {
    async fn run(mut self) -> Result<DisconnectReason, ClientError> {
        let mut backoff = Backoff::new(
            self.config.initial_backoff,
            self.config.max_backoff,
            self.config.backoff_jitter,
            self.config.max_attempts,
        );

        loop {
            let conn = tokio::select! {
                conn = dial(&self.config, &mut backoff) => conn?,
                _ = self.shutdown.wait_for(|stop| *stop) => return Ok(DisconnectReason::Closing),
            };

            match self.session(conn).await {
                SessionEnd::Ended(reason) => {
                    info!(%reason, "session ended");
                    return Ok(reason);
                }
                SessionEnd::Lost => {
                    let _ = self.events.send(ClientEvent::ConnectionLost);
                    time::sleep(self.config.initial_backoff).await;
                }
            }
        }
    }

    async fn session(&mut self, conn: WebSocketConnection) -> SessionEnd {
        let handshake = PeerRecord::Connect {
            username: self.config.username.clone(),
            credential: self.config.credential.clone(),
        };
        if let Err(e) = conn.send(&self.codec.encode_peer(&handshake)).await {
            debug!(error = %e, "handshake send failed");
            return SessionEnd::Lost;
        }
        info!(addr = %conn.remote_addr(), username = %self.config.username, "connected");
        let _ = self.events.send(ClientEvent::Connected);

        let (heard, heard_rx) = watch::channel(Instant::now());
        let (signals, mut health) = mpsc::channel(4);
        let _health = HealthGuard(spawn_health(
            heard_rx,
            signals,
            self.config.health_interval,
            self.config.liveness_timeout,
        ));

        loop {
            tokio::select! {
                _ = async { let _ = self.shutdown.wait_for(|stop| *stop).await; } => {
                    let _ = conn.close().await;
                    return SessionEnd::Ended(DisconnectReason::Closing);
                }

                inbound = conn.recv() => match inbound {
                    Ok(Some(raw)) => {
                        heard.send_replace(Instant::now());
                        match self.codec.decode_server(&raw) {
                            Ok(record) => {
                                if let Some(reason) = route(&self.reconciler, &self.events, record).await {
                                    let _ = conn.close().await;
                                    return SessionEnd::Ended(reason);
                                }
                            }
                            Err(e) => debug!(error = %e, "dropping malformed record"),
                        }
                    }
                    Ok(None) => {
                        info!("server closed the connection");
                        return SessionEnd::Lost;
                    }
                    Err(e) => {
                        debug!(error = %e, "recv error");
                        return SessionEnd::Lost;
                    }
                },

                Some(record) = self.outbound.recv() => {
                    if let Err(e) = conn.send(&self.codec.encode_peer(&record)).await {
                        debug!(error = %e, "send failed");
                        return SessionEnd::Lost;
                    }
                }

                signal = health.recv() => match signal {
                    Some(HealthSignal::Ping) => {
                        if conn.send(&self.codec.encode_peer(&PeerRecord::Ping)).await.is_err() {
                            return SessionEnd::Lost;
                        }
                    }
                    Some(HealthSignal::Stale) | None => {
                        warn!(timeout = ?self.config.liveness_timeout, "server went silent, reconnecting");
                        let _ = conn.close().await;
                        return SessionEnd::Lost;
                    }
                },
            }
        }
    }
}

/// Dials until it connects or the backoff gives up.
async fn dial(config: &ClientConfig, backoff: &mut Backoff) -> Result<WebSocketConnection, ClientError> {
    loop {
        match WebSocketConnection::connect(&config.server_addr).await {
            Ok(conn) => {
                backoff.reset();
                return Ok(conn);
            }
            Err(e) => match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        addr = %config.server_addr,
                        attempt = backoff.attempts(),
                        ?delay,
                        error = %e,
                        "connect failed, retrying"
                    );
                    time::sleep(delay).await;
                }
                None => {
                    return Err(ClientError::RetriesExhausted {
                        attempts: backoff.attempts(),
                        last: e,
                    });
                }
            },
        }
    }
}

/// Hands settlement records to the reconciler and turns the rest into
/// events. Returns the reason when the server ended the session.
async fn route(
    reconciler: &ReconcilerHandle,
    events: &mpsc::UnboundedSender<ClientEvent>,
    record: ServerRecord,
) -> Option<DisconnectReason> {
    let event = match record {
        settlement @ (ServerRecord::SettlementAdd { .. }
        | ServerRecord::SettlementRemove { .. }
        | ServerRecord::SettlementSync(_)) => {
            match reconciler.apply(settlement).await {
                Ok(Some(report)) => {
                    debug!(destroyed = report.destroyed, created = report.created, "reconciled");
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "settlement record dropped"),
            }
            return None;
        }
        ServerRecord::Pong => return None,
        ServerRecord::Chat { sender, text } => ClientEvent::Chat { sender, text },
        ServerRecord::Notification { text } => ClientEvent::Notification { text },
        ServerRecord::ForcedEvent { event } => ClientEvent::ForcedEvent { event },
        ServerRecord::GiftedItems(item) => ClientEvent::Gift(item),
        ServerRecord::Promote => ClientEvent::Promoted,
        ServerRecord::Demote => ClientEvent::Demoted,
        ServerRecord::Disconnect(reason) => {
            let _ = events.send(ClientEvent::Disconnected(reason.clone()));
            return Some(reason);
        }
    };
    let _ = events.send(event);
    None
}

// ---------------------------------------------------------------------------
// Health task
// ---------------------------------------------------------------------------

/// Aborts the health task when the session ends.
struct HealthGuard(JoinHandle<()>);

impl Drop for HealthGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn spawn_health(
    heard: watch::Receiver<Instant>,
    signals: mpsc::Sender<HealthSignal>,
    interval: Duration,
    liveness_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let silent = heard.borrow().elapsed();
            let signal = if silent > liveness_timeout {
                HealthSignal::Stale
            } else {
                HealthSignal::Ping
            };
            if signals.send(signal).await.is_err() || signal == HealthSignal::Stale {
                break;
            }
        }
    })
}

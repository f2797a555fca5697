//! Per-connection handler: handshake, initial sync and record routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `Connect│user│credential` → admit through the registry
//!   2. Push the full settlement sync and any queued gifts
//!   3. Loop: inbound records, outbound records, cancellation
//!
//! Moderation actions never touch the socket. They queue records on the
//! client's outbound channel and set its cancellation signal; this task
//! notices the signal at the top of its next loop iteration, flushes what
//! is queued and closes. The delay between a kick and the close is
//! therefore bounded by one record's handling time.

use std::sync::Arc;
use std::time::Duration;

use outpost_protocol::{Codec, DisconnectReason, PeerRecord, ProtocolError, ServerRecord, TileId};
use outpost_session::{AdmissionPolicy, ClientRecord, PeerSender, SessionRegistry};
use outpost_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::{OutpostError, ServerState};

/// Drop guard that releases the client's registry entry when the handler
/// exits, even on panic. `Drop` is synchronous, so the locked part runs
/// in a spawned task.
struct ConnectionGuard {
    username: String,
    generation: u64,
    state: Arc<ServerState>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let username = std::mem::take(&mut self.username);
        let generation = self.generation;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.registry().lock().await.release(&username, generation);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), OutpostError> {
    let conn_id = conn.id();
    let addr = conn.remote_addr();
    tracing::debug!(%conn_id, %addr, "handling new connection");

    // --- Step 1: Handshake ---
    let (username, credential) = receive_connect(&conn, &state).await?;

    let (tx, mut outbound) = mpsc::unbounded_channel();
    let config = state.config().await;
    let admitted = state.registry().lock().await.admit(
        &username,
        &credential,
        addr,
        tx.clone(),
        AdmissionPolicy {
            max_players: config.max_players,
            whitelist: config.active_whitelist(),
        },
    );
    let admission = match admitted {
        Ok(admission) => admission,
        Err(e) => {
            tracing::info!(%username, %addr, reason = %e, "connection refused");
            let notice = state
                .codec()
                .encode_server(&ServerRecord::Disconnect(e.disconnect_reason()));
            let _ = conn.send(&notice).await;
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    let _guard = ConnectionGuard {
        username: username.clone(),
        generation: admission.generation,
        state: Arc::clone(&state),
    };
    let mut cancel = admission.cancel;

    // --- Step 2: Initial sync ---
    send_initial_state(&state, &username, &tx).await;

    // --- Step 3: Record loop ---
    loop {
        tokio::select! {
            biased;

            changed = cancel.changed() => {
                let reason = match changed {
                    Ok(()) => cancel.borrow_and_update().clone(),
                    Err(_) => Some(DisconnectReason::Closing),
                };
                if let Some(reason) = reason {
                    tracing::info!(%username, %reason, "closing connection");
                    flush(&conn, &state, &mut outbound).await;
                    let _ = conn.close().await;
                    break;
                }
            }

            Some(record) = outbound.recv() => {
                let wire = state.codec().encode_server(&record);
                if let Err(e) = conn.send(&wire).await {
                    tracing::debug!(%username, error = %e, "send failed");
                    break;
                }
            }

            inbound = conn.recv() => match inbound {
                Ok(Some(raw)) => {
                    state.registry().lock().await.touch(&username);
                    match state.codec().decode_peer(&raw) {
                        Ok(record) => handle_peer_record(&state, &username, record, &tx).await,
                        Err(e) => {
                            tracing::debug!(%username, error = %e, "dropping malformed record");
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!(%username, "connection closed by peer");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%username, error = %e, "recv error");
                    break;
                }
            },
        }
    }

    // _guard drops here → registry release fires.
    Ok(())
}

/// Waits for the `Connect` record.
async fn receive_connect(
    conn: &WebSocketConnection,
    state: &ServerState,
) -> Result<(String, String), OutpostError> {
    let timeout = Duration::from_secs(state.config().await.handshake_timeout_secs);

    let raw = match tokio::time::timeout(timeout, conn.recv()).await {
        Ok(Ok(Some(raw))) => raw,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    match state.codec().decode_peer(&raw)? {
        PeerRecord::Connect {
            username,
            credential,
        } => Ok((username, credential)),
        _ => {
            let _ = conn.close().await;
            Err(ProtocolError::InvalidMessage("first record must be Connect".into()).into())
        }
    }
}

/// Sends the settlement sync and drains the gift queue.
async fn send_initial_state(state: &ServerState, username: &str, tx: &PeerSender) {
    let gifts = {
        let mut registry = state.registry().lock().await;
        let pending = registry
            .saved(username)
            .is_some_and(|record| !record.gift_queue.is_empty());
        if pending {
            let mut gifts = Vec::new();
            update_saved(&mut registry, username, |record| {
                gifts = std::mem::take(&mut record.gift_queue);
            });
            gifts
        } else {
            Vec::new()
        }
    };

    let entries = state.roster().lock().await.sync_for(username);
    let _ = tx.send(ServerRecord::sync(entries));

    for gift in gifts {
        let _ = tx.send(ServerRecord::GiftedItems(gift));
    }
}

/// Sends everything already queued for the peer.
async fn flush(
    conn: &WebSocketConnection,
    state: &ServerState,
    outbound: &mut mpsc::UnboundedReceiver<ServerRecord>,
) {
    while let Ok(record) = outbound.try_recv() {
        let wire = state.codec().encode_server(&record);
        if conn.send(&wire).await.is_err() {
            break;
        }
    }
}

/// Routes one decoded peer record.
async fn handle_peer_record(state: &ServerState, username: &str, record: PeerRecord, tx: &PeerSender) {
    match record {
        PeerRecord::Ping => {
            let _ = tx.send(ServerRecord::Pong);
        }

        PeerRecord::Chat { text } => {
            tracing::info!(%username, %text, "chat");
            if state.config().await.using_chat {
                state.registry().lock().await.broadcast(
                    &ServerRecord::Chat {
                        sender: username.to_string(),
                        text: text.clone(),
                    },
                    Some(username),
                );
            }
            state.chat().lock().await.push(username, &text);
        }

        PeerRecord::NewSettlement { tile } => found_settlement(state, username, tile).await,

        PeerRecord::AbandonSettlement => abandon_settlement(state, username).await,

        PeerRecord::ClientValues { wealth, pawn_count } => {
            let mut registry = state.registry().lock().await;
            update_saved(&mut registry, username, |record| {
                record.wealth = wealth;
                record.pawn_count = pawn_count;
            });
        }

        PeerRecord::Connect { .. } => {
            tracing::debug!(%username, "ignoring repeated Connect");
        }
    }
}

async fn found_settlement(state: &ServerState, username: &str, tile: TileId) {
    let mut registry = state.registry().lock().await;
    let mut roster = state.roster().lock().await;

    if !roster.claim(tile, username) {
        tracing::warn!(%username, %tile, "tile already settled, ignoring");
        return;
    }

    let previous = registry.saved(username).and_then(|r| r.home_tile);
    if !update_saved(&mut registry, username, |record| record.home_tile = Some(tile)) {
        roster.release(tile);
        return;
    }
    if let Some(old) = previous.filter(|old| *old != tile) {
        roster.release(old);
        registry.broadcast(&ServerRecord::SettlementRemove { tile: old }, Some(username));
    }

    registry.broadcast(
        &ServerRecord::SettlementAdd {
            tile,
            base_name: username.to_string(),
        },
        Some(username),
    );
    tracing::info!(%username, %tile, "settlement founded");
}

async fn abandon_settlement(state: &ServerState, username: &str) {
    let mut registry = state.registry().lock().await;
    let Some(tile) = registry.saved(username).and_then(|r| r.home_tile) else {
        tracing::debug!(%username, "abandon without a settlement");
        return;
    };

    update_saved(&mut registry, username, |record| record.home_tile = None);
    state.roster().lock().await.release(tile);
    registry.broadcast(&ServerRecord::SettlementRemove { tile }, Some(username));
    tracing::info!(%username, %tile, "settlement abandoned");
}

/// Applies `change` to the peer's saved record.
///
/// A connected peer always has one; a miss is logged and reported as `false`.
fn update_saved<F>(registry: &mut SessionRegistry, username: &str, change: F) -> bool
where
    F: FnOnce(&mut ClientRecord),
{
    match registry.update(username, change) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(%username, error = %e, "saved record missing for connected peer");
            false
        }
    }
}

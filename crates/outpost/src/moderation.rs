//! Moderation actions run by the operator console.
//!
//! Every action resolves its target under the registry lock, mutates the
//! saved record through [`SessionRegistry::update`] (which persists it),
//! queues any client-visible record on the live connection and logs one
//! confirmation. A target that is not found aborts only that action.
//!
//! Live actions look the target up in the connected set. `investigate`,
//! `immunize` and `deimmunize` search the saved roster first and report
//! live status separately, so they also work on offline players.
//!
//! [`SessionRegistry::update`]: outpost_session::SessionRegistry::update

use outpost_protocol::{DisconnectReason, GiftedItem, ServerRecord};
use outpost_session::{ConnectedClient, SessionRegistry};

use crate::{ConsoleError, ServerState};

/// Sender tag on chat lines sent from the console.
pub const CONSOLE_SENDER: &str = "SERVER";

fn live<'a>(registry: &'a SessionRegistry, username: &str) -> Result<&'a ConnectedClient, ConsoleError> {
    registry
        .connected(username)
        .ok_or_else(|| ConsoleError::PlayerNotFound(username.to_string()))
}

fn not_found(username: &str) -> ConsoleError {
    ConsoleError::PlayerNotFound(username.to_string())
}

// ---------------------------------------------------------------------------
// Communication
// ---------------------------------------------------------------------------

/// Sends a chat line from the console to every peer and caches it.
pub async fn say(state: &ServerState, text: &str) -> Result<(), ConsoleError> {
    let sent = state.registry().lock().await.broadcast(
        &ServerRecord::Chat {
            sender: CONSOLE_SENDER.to_string(),
            text: text.to_string(),
        },
        None,
    );
    state.chat().lock().await.push("Console", text);
    tracing::info!(peers = sent, "Chat - [Console] {text}");
    Ok(())
}

/// Shows a notification letter to every peer.
pub async fn broadcast(state: &ServerState, text: &str) -> Result<(), ConsoleError> {
    let sent = state.registry().lock().await.broadcast(
        &ServerRecord::Notification {
            text: text.to_string(),
        },
        None,
    );
    tracing::info!(peers = sent, "Letter Sent To Every Connected Player");
    Ok(())
}

/// Shows a notification letter to one peer.
pub async fn notify(state: &ServerState, username: &str, text: &str) -> Result<(), ConsoleError> {
    let registry = state.registry().lock().await;
    live(&registry, username)?.send(ServerRecord::Notification {
        text: text.to_string(),
    });
    tracing::info!("Sent Letter To [{username}]");
    Ok(())
}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

/// Forces an event on one peer.
pub async fn invoke(state: &ServerState, username: &str, event: &str) -> Result<(), ConsoleError> {
    let registry = state.registry().lock().await;
    live(&registry, username)?.send(ServerRecord::ForcedEvent {
        event: event.to_string(),
    });
    tracing::info!("Sent Event [{event}] to [{username}]");
    Ok(())
}

/// Forces an event on every peer.
pub async fn plague(state: &ServerState, event: &str) -> Result<(), ConsoleError> {
    state.registry().lock().await.broadcast(
        &ServerRecord::ForcedEvent {
            event: event.to_string(),
        },
        None,
    );
    tracing::info!("Sent Event [{event}] to Every Player");
    Ok(())
}

/// Gifts an item to one connected peer.
pub async fn give_item(state: &ServerState, username: &str, item: GiftedItem) -> Result<(), ConsoleError> {
    let registry = state.registry().lock().await;
    live(&registry, username)?.send(ServerRecord::GiftedItems(item));
    tracing::info!("Item Has Been Gifted To Player [{username}]");
    Ok(())
}

/// Gifts an item to every connected peer.
pub async fn give_item_all(state: &ServerState, item: GiftedItem) -> Result<(), ConsoleError> {
    let sent = state
        .registry()
        .lock()
        .await
        .broadcast(&ServerRecord::GiftedItems(item), None);
    tracing::info!(peers = sent, "Item Has Been Gifted To Every Player");
    Ok(())
}

// ---------------------------------------------------------------------------
// Admin control
// ---------------------------------------------------------------------------

/// Every field of a saved record plus live status.
pub async fn investigate(state: &ServerState, username: &str) -> Result<Vec<String>, ConsoleError> {
    let registry = state.registry().lock().await;
    let record = registry.saved(username).ok_or_else(|| not_found(username))?;
    let connection = registry.connected(username);

    let home = record
        .home_tile
        .map_or_else(|| "None".to_string(), |tile| tile.to_string());
    let address = connection.map_or_else(|| "None".to_string(), |c| c.addr().ip().to_string());

    Ok(vec![
        format!("Player Details: {}", record.username),
        format!("Username: [{}]", record.username),
        format!("Password: [{}]", record.credential),
        format!("Admin: [{}]", record.is_admin),
        format!("Online: [{}]", connection.is_some()),
        format!("Connection IP: [{address}]"),
        format!("Home Tile ID: [{home}]"),
        format!("Stored Gifts: [{}]", record.gift_queue.len()),
        format!("Stored Trades: [{}]", record.trade_queue.len()),
        format!("Wealth Value: [{}]", record.wealth),
        format!("Pawn Amount: [{}]", record.pawn_count),
        format!("Immunized: [{}]", record.is_immunized),
        format!("Event Shielded: [{}]", record.event_shielded),
    ])
}

/// Soft-disconnects a peer. Nothing is persisted.
pub async fn kick(state: &ServerState, username: &str) -> Result<(), ConsoleError> {
    let registry = state.registry().lock().await;
    live(&registry, username)?.disconnect(DisconnectReason::Kicked);
    tracing::info!("Player [{username}] Has Been Kicked");
    Ok(())
}

/// Bans a peer's address and soft-disconnects it.
pub async fn ban(state: &ServerState, username: &str) -> Result<(), ConsoleError> {
    let mut registry = state.registry().lock().await;
    let addr = live(&registry, username)?.addr().ip();
    registry.insert_ban(addr, username);
    if let Some(client) = registry.connected(username) {
        client.disconnect(DisconnectReason::Banned);
    }
    tracing::info!(%addr, "Player [{username}] Has Been Banned");
    Ok(())
}

/// Lifts every ban recorded under `username`.
pub async fn pardon(state: &ServerState, username: &str) -> Result<(), ConsoleError> {
    let removed = state.registry().lock().await.pardon(username);
    if removed == 0 {
        return Err(not_found(username));
    }
    tracing::info!(addresses = removed, "Player [{username}] Has Been Unbanned");
    Ok(())
}

pub async fn promote(state: &ServerState, username: &str) -> Result<(), ConsoleError> {
    set_admin(state, username, true).await
}

pub async fn demote(state: &ServerState, username: &str) -> Result<(), ConsoleError> {
    set_admin(state, username, false).await
}

async fn set_admin(state: &ServerState, username: &str, admin: bool) -> Result<(), ConsoleError> {
    let mut registry = state.registry().lock().await;
    live(&registry, username)?;

    let current = registry.saved(username).is_some_and(|r| r.is_admin);
    if current == admin {
        if admin {
            tracing::info!("Player [{username}] Was Already An Administrator");
        } else {
            tracing::info!("Player [{username}] Is Not An Administrator");
        }
        return Ok(());
    }

    registry
        .update(username, |record| record.is_admin = admin)
        .map_err(|_| not_found(username))?;
    if let Some(client) = registry.connected(username) {
        client.send(if admin {
            ServerRecord::Promote
        } else {
            ServerRecord::Demote
        });
    }

    if admin {
        tracing::info!("Player [{username}] Has Been Promoted");
    } else {
        tracing::info!("Player [{username}] Has Been Demoted");
    }
    Ok(())
}

pub async fn protect(state: &ServerState, username: &str) -> Result<(), ConsoleError> {
    let mut registry = state.registry().lock().await;
    live(&registry, username)?;
    registry
        .update(username, |record| record.event_shielded = true)
        .map_err(|_| not_found(username))?;
    tracing::info!("Player [{username}] Has Been Protected");
    Ok(())
}

pub async fn deprotect(state: &ServerState, username: &str) -> Result<(), ConsoleError> {
    let mut registry = state.registry().lock().await;
    live(&registry, username)?;
    registry
        .update(username, |record| record.event_shielded = false)
        .map_err(|_| not_found(username))?;
    tracing::info!("Player [{username}] Has Been Deprotected");
    Ok(())
}

pub async fn immunize(state: &ServerState, username: &str) -> Result<(), ConsoleError> {
    set_immunity(state, username, true).await
}

pub async fn deimmunize(state: &ServerState, username: &str) -> Result<(), ConsoleError> {
    set_immunity(state, username, false).await
}

async fn set_immunity(state: &ServerState, username: &str, immune: bool) -> Result<(), ConsoleError> {
    let mut registry = state.registry().lock().await;
    registry
        .update(username, |record| record.is_immunized = immune)
        .map_err(|_| not_found(username))?;
    let online = registry.is_connected(username);

    if immune {
        tracing::info!(online, "Player [{username}] Has Been Immunized");
    } else {
        tracing::info!(online, "Player [{username}] Has Been Deimmunized");
    }
    Ok(())
}

/// Soft-disconnects everyone and zeroes saved progress.
///
/// The console asks for confirmation before calling this.
pub async fn wipe(state: &ServerState) -> Result<usize, ConsoleError> {
    let mut registry = state.registry().lock().await;
    registry.disconnect_all(DisconnectReason::Wiped);
    let wiped = registry.wipe_progress();
    tracing::info!(players = wiped, "All Player Progress Has Been Wiped");
    Ok(wiped)
}

/// Soft-disconnects everyone and stops the server.
pub async fn exit(state: &ServerState) -> Result<(), ConsoleError> {
    state
        .registry()
        .lock()
        .await
        .disconnect_all(DisconnectReason::Closing);
    state.begin_shutdown();
    tracing::info!("Server Closing");
    Ok(())
}

//! Periodic connection-health sweep.

use std::sync::Arc;
use std::time::Duration;

use outpost_protocol::DisconnectReason;
use tokio::task::JoinHandle;

use crate::ServerState;

/// Soft-disconnects clients that have been silent too long.
///
/// Returns the usernames it disconnected. Does nothing when the idle
/// timeout is `0`.
pub async fn sweep_idle(state: &ServerState) -> Vec<String> {
    let timeout = state.config().await.idle_timeout_secs;
    if timeout == 0 {
        return Vec::new();
    }

    let registry = state.registry().lock().await;
    let idle = registry.idle_clients(Duration::from_secs(timeout));
    for username in &idle {
        if let Some(client) = registry.connected(username) {
            client.disconnect(DisconnectReason::Idle);
            tracing::info!(%username, "idle client disconnected");
        }
    }
    idle
}

/// Runs [`sweep_idle`] every `interval` until the server shuts down.
pub(crate) fn spawn_health_sweep(state: Arc<ServerState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately.
        ticker.tick().await;

        while !state.is_shutting_down() {
            ticker.tick().await;
            let idle = sweep_idle(&state).await;
            if !idle.is_empty() {
                tracing::debug!(count = idle.len(), "health sweep");
            }
        }
    })
}

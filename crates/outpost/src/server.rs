//! `OutpostServer` builder, shared state and accept loop.
//!
//! This is the entry point for running an Outpost server. It ties the
//! layers together: transport → protocol → session, plus the settlement
//! roster and chat cache that live only on the server.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use outpost_protocol::DelimitedCodec;
use outpost_session::{JsonStore, Persistence, SessionRegistry};
use outpost_transport::{Transport, WebSocketTransport};
use tokio::sync::{Mutex, RwLock, watch};

use crate::chat::ChatCache;
use crate::handler::handle_connection;
use crate::health::spawn_health_sweep;
use crate::roster::SettlementRoster;
use crate::{OutpostError, ServerConfig};

/// Server version reported by `status`.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// State shared by the console and every connection task.
///
/// # Lock order
///
/// `registry` → `roster` → `chat`. A task holding one of these never
/// acquires an earlier one. `config` is only ever read into a copy and
/// released before any other lock is taken.
pub struct ServerState {
    registry: Mutex<SessionRegistry>,
    roster: Mutex<SettlementRoster>,
    chat: Mutex<ChatCache>,
    config: RwLock<ServerConfig>,
    codec: DelimitedCodec,
    started_at: DateTime<Local>,
    shutdown: watch::Sender<bool>,
}

impl ServerState {
    /// Loads the registry from `store` and derives the settlement roster.
    pub fn new(config: ServerConfig, store: Arc<dyn Persistence>) -> Result<Arc<Self>, OutpostError> {
        let registry = SessionRegistry::load(store)?;
        let roster = SettlementRoster::from_homes(registry.home_tiles());
        let (shutdown, _) = watch::channel(false);

        Ok(Arc::new(Self {
            registry: Mutex::new(registry),
            roster: Mutex::new(roster),
            chat: Mutex::new(ChatCache::default()),
            config: RwLock::new(config),
            codec: DelimitedCodec::default(),
            started_at: Local::now(),
            shutdown,
        }))
    }

    pub fn registry(&self) -> &Mutex<SessionRegistry> {
        &self.registry
    }

    pub fn roster(&self) -> &Mutex<SettlementRoster> {
        &self.roster
    }

    pub fn chat(&self) -> &Mutex<ChatCache> {
        &self.chat
    }

    pub fn codec(&self) -> &DelimitedCodec {
        &self.codec
    }

    /// A copy of the current configuration.
    pub async fn config(&self) -> ServerConfig {
        self.config.read().await.clone()
    }

    pub(crate) async fn reload_config(&self, fresh: ServerConfig) {
        self.config.write().await.reload_lists(fresh);
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn uptime(&self) -> chrono::Duration {
        Local::now() - self.started_at
    }

    /// Stops the accept loop and the health sweep.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// Builder for configuring and starting an Outpost server.
///
/// # Example
///
/// ```rust,ignore
/// use outpost::prelude::*;
///
/// let server = OutpostServer::builder()
///     .config(ServerConfig::default())
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct OutpostServerBuilder {
    config: ServerConfig,
    store: Option<Arc<dyn Persistence>>,
}

impl OutpostServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            store: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the bind address from the config.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Uses `store` instead of a [`JsonStore`] under `config.data_dir`.
    pub fn store(mut self, store: Arc<dyn Persistence>) -> Self {
        self.store = Some(store);
        self
    }

    /// Loads state and binds the listener.
    pub async fn build(self) -> Result<OutpostServer, OutpostError> {
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(JsonStore::open(&self.config.data_dir)?),
        };
        let transport = WebSocketTransport::bind(&self.config.bind).await?;
        let state = ServerState::new(self.config, store)?;

        Ok(OutpostServer { transport, state })
    }
}

impl Default for OutpostServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Outpost server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct OutpostServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl OutpostServer {
    pub fn builder() -> OutpostServerBuilder {
        OutpostServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The shared state, for the operator console.
    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Runs the accept loop until [`ServerState::begin_shutdown`] is called.
    ///
    /// Each accepted connection gets its own handler task. The health
    /// sweep runs alongside.
    pub async fn run(mut self) -> Result<(), OutpostError> {
        let config = self.state.config().await;
        tracing::info!(
            bind = %config.bind,
            name = %config.server_name,
            "outpost server running"
        );

        let health = spawn_health_sweep(
            Arc::clone(&self.state),
            Duration::from_secs(config.health_interval_secs.max(1)),
        );
        let mut shutdown = self.state.shutdown_signal();

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        health.abort();
        if let Err(e) = self.transport.shutdown().await {
            tracing::warn!(error = %e, "listener shutdown failed");
        }
        tracing::info!("outpost server stopped");
        Ok(())
    }
}

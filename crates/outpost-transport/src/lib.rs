//! Transport abstraction layer for Outpost.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the network carrier. Records are text: one wire record per frame, the
//! field layout is the protocol crate's business.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Process-unique tag for one connection, used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The listening side of the server.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer and completes its upgrade.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops listening and releases the bound address. Connections already
    /// accepted stay open. Calling it twice is an error.
    async fn shutdown(&mut self) -> Result<(), Self::Error>;
}

/// A single connection that carries text records in both directions.
///
/// `send` and `recv` may be called concurrently from the same task
/// (e.g. from two branches of a `select!`); implementations must not
/// hold one direction's lock while waiting on the other.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one record to the remote peer.
    async fn send(&self, record: &str) -> Result<(), Self::Error>;

    /// Receives the next record from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<String>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the address of the remote peer.
    fn remote_addr(&self) -> SocketAddr;
}

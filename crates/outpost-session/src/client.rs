//! Client types: the saved record and the live connection entry.
//!
//! A client exists twice. The [`ClientRecord`] is permanent, loaded at
//! startup and written back after every change. The [`ConnectedClient`]
//! lives only while a connection is open and carries nothing that needs
//! saving: the address, the outbound channel and the cancellation signal.
//! Moderation flags live on the record alone, so there is only one copy
//! of each to keep up to date.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use outpost_protocol::{DisconnectReason, GiftedItem, ServerRecord, TileId};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// ClientRecord
// ---------------------------------------------------------------------------

/// A client's persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientRecord {
    pub username: String,
    /// Compared verbatim on every handshake.
    pub credential: String,
    pub is_admin: bool,
    pub is_immunized: bool,
    /// Protected from forced events.
    pub event_shielded: bool,
    pub wealth: f64,
    pub pawn_count: u32,
    pub home_tile: Option<TileId>,
    /// Gifts waiting for the client's next connection.
    pub gift_queue: Vec<GiftedItem>,
    pub trade_queue: Vec<String>,
}

impl ClientRecord {
    /// A freshly registered client.
    pub fn new(username: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            credential: credential.into(),
            ..Self::default()
        }
    }
}

impl Default for ClientRecord {
    fn default() -> Self {
        Self {
            username: String::new(),
            credential: String::new(),
            is_admin: false,
            is_immunized: false,
            event_shielded: false,
            wealth: 0.0,
            pawn_count: 0,
            home_tile: None,
            gift_queue: Vec::new(),
            trade_queue: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectedClient
// ---------------------------------------------------------------------------

/// Channel sender for records pushed to one peer.
pub type PeerSender = mpsc::UnboundedSender<ServerRecord>;

/// Receiving side of a connection's cancellation signal.
pub type CancelReceiver = watch::Receiver<Option<DisconnectReason>>;

/// A live connection.
#[derive(Debug)]
pub struct ConnectedClient {
    username: String,
    addr: SocketAddr,
    sender: PeerSender,
    cancel: watch::Sender<Option<DisconnectReason>>,
    generation: u64,
    connected_at: Instant,
    last_seen: Instant,
}

impl ConnectedClient {
    pub(crate) fn new(
        username: String,
        addr: SocketAddr,
        sender: PeerSender,
        generation: u64,
    ) -> (Self, CancelReceiver) {
        let (cancel, cancel_rx) = watch::channel(None);
        let now = Instant::now();
        let client = Self {
            username,
            addr,
            sender,
            cancel,
            generation,
            connected_at: now,
            last_seen: now,
        };
        (client, cancel_rx)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Identifies this connection among successive logins of one user.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.elapsed()
    }

    pub(crate) fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Queues a record for the peer. Returns `false` if the connection
    /// task is gone.
    pub fn send(&self, record: ServerRecord) -> bool {
        self.sender.send(record).is_ok()
    }

    /// Sends `Disconnect│reason` and asks the connection task to close.
    ///
    /// The task closes after it finishes the record it is handling and
    /// flushes what is already queued.
    pub fn disconnect(&self, reason: DisconnectReason) {
        self.send(ServerRecord::Disconnect(reason.clone()));
        self.cancel.send_replace(Some(reason));
    }

    /// Returns `true` once [`disconnect`](Self::disconnect) was called.
    pub fn is_disconnecting(&self) -> bool {
        self.cancel.borrow().is_some()
    }
}

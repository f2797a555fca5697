//! Error types for the session layer.

use std::net::IpAddr;
use std::path::PathBuf;

use outpost_protocol::DisconnectReason;

/// Errors from the session registry.
///
/// The admission variants map one-to-one onto the `Disconnect` reason the
/// peer is sent (see [`SessionError::disconnect_reason`]).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer's address is in the ban map.
    #[error("address {0} is banned")]
    Banned(IpAddr),

    /// The whitelist is on and this username is not on it.
    #[error("player {0} is not whitelisted")]
    NotWhitelisted(String),

    /// The server already holds `max_players` connections.
    #[error("server is full")]
    Full,

    /// The credential does not match the saved record.
    #[error("wrong credential for player {0}")]
    InvalidCredentials(String),

    /// The username already has a live connection.
    #[error("player {0} is already connected")]
    AlreadyConnected(String),

    /// The username is empty or cannot be stored.
    #[error("invalid username `{0}`")]
    InvalidUsername(String),

    /// No client with this username in the looked-up set.
    #[error("Player {0} Not Found")]
    PlayerNotFound(String),
}

impl SessionError {
    /// The reason sent to a peer rejected with this error.
    pub fn disconnect_reason(&self) -> DisconnectReason {
        match self {
            Self::Banned(_) => DisconnectReason::Banned,
            Self::NotWhitelisted(_) => DisconnectReason::Whitelist,
            Self::Full => DisconnectReason::Full,
            Self::InvalidCredentials(_) | Self::InvalidUsername(_) => DisconnectReason::Credentials,
            Self::AlreadyConnected(_) => DisconnectReason::AlreadyConnected,
            Self::PlayerNotFound(_) => DisconnectReason::Closing,
        }
    }
}

/// Errors from a [`Persistence`](crate::Persistence) backend.
///
/// The registry logs these and keeps its in-memory state; nothing is
/// rolled back.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

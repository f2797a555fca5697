//! Error types for the server crate.

use std::path::PathBuf;

use outpost_protocol::ProtocolError;
use outpost_session::{PersistenceError, SessionError};
use outpost_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` variants let `?` convert layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum OutpostError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Console(#[from] ConsoleError),

    /// The config file is not valid TOML for [`ServerConfig`](crate::ServerConfig).
    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operator console's input or output failed.
    #[error("console i/o failed: {0}")]
    ConsoleIo(#[source] std::io::Error),
}

/// A console command that could not run.
///
/// Each one aborts only the command that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("Command \"{0}\" Not Found")]
    UnknownCommand(String),

    #[error("Missing Parameters. Usage: {usage}")]
    MissingArguments { usage: &'static str },

    #[error("Invalid Parameter [{value}]: {reason}")]
    InvalidArgument { value: String, reason: &'static str },

    #[error("Player {0} Not Found")]
    PlayerNotFound(String),

    /// `reload` was used on a server started without a config file.
    #[error("No Config File To Reload")]
    NoConfigFile,

    #[error("Failed To Reload Config: {0}")]
    ReloadFailed(String),
}

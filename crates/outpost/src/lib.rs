//! # Outpost
//!
//! Authoritative server for the Outpost multiplayer overlay.
//!
//! The server owns the session registry (saved players, live connections,
//! the ban map) and the settlement roster every peer converges to. It
//! accepts WebSocket peers, pushes settlement changes to them, and runs an
//! operator [`Console`] whose moderation actions reach live connections
//! through their outbound queues and cancellation signals.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use outpost::prelude::*;
//!
//! # async fn start() -> Result<(), OutpostError> {
//! let server = OutpostServer::builder()
//!     .config(ServerConfig::default())
//!     .build()
//!     .await?;
//! let mut console = Console::new(server.state());
//! tokio::spawn(server.run());
//! console
//!     .run(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout())
//!     .await
//! # }
//! ```

pub mod chat;
pub mod command;
pub mod config;
pub mod console;
pub mod display;
pub mod error;
mod handler;
pub mod health;
pub mod moderation;
pub mod roster;
pub mod server;

pub use command::Command;
pub use config::ServerConfig;
pub use console::{Console, Reply};
pub use error::{ConsoleError, OutpostError};
pub use server::{OutpostServer, OutpostServerBuilder, ServerState};

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::{
        Command, Console, ConsoleError, OutpostError, OutpostServer, Reply, ServerConfig,
        ServerState,
    };
    pub use outpost_protocol::{DisconnectReason, GiftedItem, ServerRecord, TileId};
    pub use outpost_session::{ClientRecord, JsonStore, MemoryStore, Persistence};
}

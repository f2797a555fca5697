//! Session bookkeeping for Outpost.
//!
//! This crate owns everything the server knows about clients:
//!
//! 1. **Saved roster**: every registered client's [`ClientRecord`], loaded
//!    at startup and written back through a [`Persistence`] backend
//! 2. **Connected set**: the live [`ConnectedClient`] entries, each with an
//!    outbound channel and a cancellation signal
//! 3. **Ban map**: banned remote addresses ([`BanMap`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← console commands and connection tasks share one registry
//!     ↕
//! Session Layer (this crate)  ← who exists, who is online, who is banned
//!     ↕
//! Protocol Layer (below)  ← ServerRecord, DisconnectReason, TileId
//! ```

mod client;
mod error;
mod registry;
mod store;

pub use client::{CancelReceiver, ClientRecord, ConnectedClient, PeerSender};
pub use error::{PersistenceError, SessionError};
pub use registry::{Admission, AdmissionPolicy, SessionRegistry};
pub use store::{BanMap, JsonStore, MemoryStore, Persistence};

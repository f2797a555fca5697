//! Peer-side runtime for Outpost.
//!
//! [`OutpostClient`] keeps one connection to the server alive:
//!
//! 1. **Establishment**: dial with exponential [`Backoff`] plus jitter
//! 2. **Health**: ping on an interval, redial when the server goes silent
//! 3. **Routing**: settlement records to the settlement reconciler,
//!    everything else to the game layer as [`ClientEvent`]s
//!
//! # How it fits in the stack
//!
//! ```text
//! Game layer (above)  ← ClientEvent, PeerRecord
//!     ↕
//! Client runtime (this crate)  ← dial, ping, route
//!     ↕
//! Settlement reconciler (beside)  ← settlement records via its handle
//!     ↕
//! Transport + protocol (below)
//! ```

mod backoff;
mod config;
mod error;
mod event;
mod runtime;

pub use backoff::Backoff;
pub use config::ClientConfig;
pub use error::ClientError;
pub use event::ClientEvent;
pub use runtime::OutpostClient;

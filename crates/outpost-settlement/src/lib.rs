//! Settlement reconciliation for Outpost peers.
//!
//! The server is the authority on which settlements exist and which
//! faction owns each one. A peer keeps:
//!
//! - a [`SettlementIndex`]: three faction buckets plus the aggregate
//!   index, updated by create / remove / full-sync events, and
//! - a [`World`]: the materialized settlement objects the game renders.
//!
//! [`SettlementReconciler`] applies events to the index and runs the
//! destroy-then-recreate pass that converges the world to it.
//! [`spawn_reconciler`] wraps one reconciler in its own task so network
//! and game code reach it only through a [`ReconcilerHandle`].
//!
//! # Key types
//!
//! - [`Settlement`]: one indexed settlement
//! - [`SettlementIndex`]: buckets + aggregate
//! - [`World`] / [`MemoryWorld`]: materialization seam and a headless impl
//! - [`SettlementReconciler`]: the operations
//! - [`ReconcilerHandle`]: message-passing access to a running reconciler

mod actor;
mod error;
mod index;
mod reconciler;
mod world;

pub use actor::{ReconcilerHandle, spawn_reconciler};
pub use error::SettlementError;
pub use index::{Settlement, SettlementIndex, SyncReport};
pub use reconciler::{ReconcileReport, SettlementReconciler};
pub use world::{MemoryWorld, ObjectId, World, WorldSettlement};

pub use outpost_protocol::{FactionTag, TileId};

//! Error types for the settlement layer.

use outpost_protocol::TileId;

/// Errors that can occur while applying settlement events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    /// A create event named a tile that is already indexed.
    #[error("settlement at tile {0} already exists")]
    Duplicate(TileId),

    /// The reconciler task has stopped.
    #[error("settlement reconciler is unavailable")]
    Unavailable,
}

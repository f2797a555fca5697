//! Error types for the client runtime.

use outpost_settlement::SettlementError;
use outpost_transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// Every dial attempt failed.
    #[error("gave up after {attempts} connection attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: TransportError,
    },

    /// The runtime task is gone.
    #[error("client runtime stopped")]
    Stopped,
}

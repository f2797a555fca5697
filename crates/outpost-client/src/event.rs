use outpost_protocol::{DisconnectReason, GiftedItem};

/// Server records the game layer acts on.
///
/// Settlement records never show up here; they go to the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The handshake was sent on a fresh connection.
    Connected,
    Chat { sender: String, text: String },
    Notification { text: String },
    ForcedEvent { event: String },
    Gift(GiftedItem),
    Promoted,
    Demoted,
    /// The server ended the session. The runtime stops after this.
    Disconnected(DisconnectReason),
    /// The connection dropped or went silent; the runtime is redialing.
    ConnectionLost,
}

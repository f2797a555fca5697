//! Typed messages for both directions of the protocol.
//!
//! [`ServerRecord`] is everything the server pushes to a peer;
//! [`PeerRecord`] is everything a peer sends to the server. Each knows
//! how to turn itself into a [`Record`] and back.

use crate::types::parse_settlement_list;
use crate::{
    DisconnectReason, GiftedItem, ProtocolError, Record, SettlementEntry, TileId,
};

// Verbs, as they appear in field 0.
const CHAT: &str = "ChatMessage";
const NOTIFICATION: &str = "Notification";
const FORCED_EVENT: &str = "ForcedEvent";
const GIFTED_ITEMS: &str = "GiftedItems";
const PROMOTE: &str = "Promote";
const DEMOTE: &str = "Demote";
const DISCONNECT: &str = "Disconnect";
const SETTLEMENT: &str = "Settlement";
const SETTLEMENT_ADD: &str = "Add";
const SETTLEMENT_REMOVE: &str = "Remove";
const SETTLEMENTS: &str = "Settlements";
const PONG: &str = "Pong";

const CONNECT: &str = "Connect";
const PING: &str = "Ping";
const NEW_SETTLEMENT: &str = "NewSettlement";
const ABANDON_SETTLEMENT: &str = "AbandonSettlement";
const CLIENT_VALUES: &str = "ClientValues";

// ---------------------------------------------------------------------------
// ServerRecord
// ---------------------------------------------------------------------------

/// Server → peer messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerRecord {
    /// `ChatMessage│sender│text`
    Chat { sender: String, text: String },

    /// `Notification│text`: a letter shown to the player.
    Notification { text: String },

    /// `ForcedEvent│eventId`
    ForcedEvent { event: String },

    /// `GiftedItems│id┼quantity┼quality┼`
    GiftedItems(GiftedItem),

    /// `Promote│`
    Promote,

    /// `Demote│`
    Demote,

    /// `Disconnect│reason`
    Disconnect(DisconnectReason),

    /// `Settlement│Add│tile│baseName`: the peer shows it as
    /// `"<baseName>'s Settlement"`.
    SettlementAdd { tile: TileId, base_name: String },

    /// `Settlement│Remove│tile`
    SettlementRemove { tile: TileId },

    /// `Settlements│t:n:f│t:n:f│…`: the full authoritative list.
    ///
    /// Entries are decoded one by one; a malformed entry stays in the
    /// list as an `Err` so the receiver can skip it without losing the
    /// rest. Only `Ok` entries are encoded.
    SettlementSync(Vec<Result<SettlementEntry, ProtocolError>>),

    /// `Pong│`: answer to a peer's `Ping│`.
    Pong,
}

impl ServerRecord {
    /// Builds a full sync from well-formed entries.
    pub fn sync<I: IntoIterator<Item = SettlementEntry>>(entries: I) -> Self {
        Self::SettlementSync(entries.into_iter().map(Ok).collect())
    }

    /// Converts into the field list the codec joins.
    pub fn to_record(&self) -> Record {
        let none = Vec::<String>::new;
        match self {
            Self::Chat { sender, text } => Record::new(CHAT, [sender.clone(), text.clone()]),
            Self::Notification { text } => Record::new(NOTIFICATION, [text.clone()]),
            Self::ForcedEvent { event } => Record::new(FORCED_EVENT, [event.clone()]),
            Self::GiftedItems(gift) => Record::new(GIFTED_ITEMS, [gift.to_field()]),
            Self::Promote => Record::new(PROMOTE, none()),
            Self::Demote => Record::new(DEMOTE, none()),
            Self::Disconnect(reason) => Record::new(DISCONNECT, [reason.to_string()]),
            Self::SettlementAdd { tile, base_name } => Record::new(
                SETTLEMENT,
                [SETTLEMENT_ADD.to_string(), tile.to_string(), base_name.clone()],
            ),
            Self::SettlementRemove { tile } => Record::new(
                SETTLEMENT,
                [SETTLEMENT_REMOVE.to_string(), tile.to_string()],
            ),
            Self::SettlementSync(entries) => Record::new(
                SETTLEMENTS,
                entries
                    .iter()
                    .filter_map(|entry| entry.as_ref().ok())
                    .map(ToString::to_string),
            ),
            Self::Pong => Record::new(PONG, none()),
        }
    }

    /// Interprets a decoded record.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownVerb`] for verbs peers never receive,
    /// field errors for missing or non-numeric positional fields.
    pub fn from_record(record: &Record) -> Result<Self, ProtocolError> {
        Ok(match record.verb() {
            CHAT => Self::Chat {
                sender: record.field(1)?.to_string(),
                text: record.rest(2)?,
            },
            NOTIFICATION => Self::Notification {
                text: record.rest(1)?,
            },
            FORCED_EVENT => Self::ForcedEvent {
                event: record.field(1)?.to_string(),
            },
            GIFTED_ITEMS => Self::GiftedItems(GiftedItem::from_field(record.field(1)?)?),
            PROMOTE => Self::Promote,
            DEMOTE => Self::Demote,
            DISCONNECT => Self::Disconnect(
                record
                    .field(1)
                    .map(DisconnectReason::from)
                    .unwrap_or(DisconnectReason::Closing),
            ),
            SETTLEMENT => match record.field(1)? {
                SETTLEMENT_ADD => Self::SettlementAdd {
                    tile: record.number(2)?,
                    base_name: record.field(3)?.to_string(),
                },
                SETTLEMENT_REMOVE => Self::SettlementRemove {
                    tile: record.number(2)?,
                },
                other => {
                    return Err(ProtocolError::UnknownVerb(format!("{SETTLEMENT}/{other}")));
                }
            },
            SETTLEMENTS => {
                // Everything after the fixed `Settlements│` prefix is the list.
                let body = if record.len() > 1 { record.rest(1)? } else { String::new() };
                Self::SettlementSync(parse_settlement_list(&body))
            }
            PONG => Self::Pong,
            other => return Err(ProtocolError::UnknownVerb(other.to_string())),
        })
    }
}

// ---------------------------------------------------------------------------
// PeerRecord
// ---------------------------------------------------------------------------

/// Peer → server messages.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerRecord {
    /// `Connect│username│credential`: must be the first record.
    Connect { username: String, credential: String },

    /// `Ping│`: liveness probe.
    Ping,

    /// `ChatMessage│text`
    Chat { text: String },

    /// `NewSettlement│tile`: the peer founded its settlement.
    NewSettlement { tile: TileId },

    /// `AbandonSettlement│`
    AbandonSettlement,

    /// `ClientValues│wealth│pawnCount`: periodic colony statistics.
    ClientValues { wealth: f64, pawn_count: u32 },
}

impl PeerRecord {
    /// Converts into the field list the codec joins.
    pub fn to_record(&self) -> Record {
        let none = Vec::<String>::new;
        match self {
            Self::Connect {
                username,
                credential,
            } => Record::new(CONNECT, [username.clone(), credential.clone()]),
            Self::Ping => Record::new(PING, none()),
            Self::Chat { text } => Record::new(CHAT, [text.clone()]),
            Self::NewSettlement { tile } => Record::new(NEW_SETTLEMENT, [tile.to_string()]),
            Self::AbandonSettlement => Record::new(ABANDON_SETTLEMENT, none()),
            Self::ClientValues { wealth, pawn_count } => {
                Record::new(CLIENT_VALUES, [wealth.to_string(), pawn_count.to_string()])
            }
        }
    }

    /// Interprets a decoded record.
    pub fn from_record(record: &Record) -> Result<Self, ProtocolError> {
        Ok(match record.verb() {
            CONNECT => Self::Connect {
                username: record.field(1)?.to_string(),
                credential: record.field(2)?.to_string(),
            },
            PING => Self::Ping,
            CHAT => Self::Chat {
                text: record.rest(1)?,
            },
            NEW_SETTLEMENT => Self::NewSettlement {
                tile: record.number(1)?,
            },
            ABANDON_SETTLEMENT => Self::AbandonSettlement,
            CLIENT_VALUES => Self::ClientValues {
                wealth: record.number(1)?,
                pawn_count: record.number(2)?,
            },
            other => return Err(ProtocolError::UnknownVerb(other.to_string())),
        })
    }
}

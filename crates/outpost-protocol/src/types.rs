//! Payload types shared by both directions of the protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ENTRY_SEPARATOR, FIELD_SEPARATOR, ProtocolError, SUB_FIELD_SEPARATOR};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A location on the shared world grid.
///
/// Serialized as the bare integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TileId(pub u32);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TileId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TileId)
    }
}

// ---------------------------------------------------------------------------
// FactionTag
// ---------------------------------------------------------------------------

/// Which authority-owned faction a settlement belongs to.
///
/// On the wire this is a single digit: `0` neutral, `1` ally, `2` enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactionTag {
    Neutral,
    Ally,
    Enemy,
}

impl FactionTag {
    /// Every tag, in bucket order.
    pub const ALL: [FactionTag; 3] = [Self::Neutral, Self::Ally, Self::Enemy];

    /// Maps a wire faction code to a tag.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Neutral),
            1 => Some(Self::Ally),
            2 => Some(Self::Enemy),
            _ => None,
        }
    }

    /// The wire faction code.
    pub fn code(self) -> u8 {
        match self {
            Self::Neutral => 0,
            Self::Ally => 1,
            Self::Enemy => 2,
        }
    }
}

impl fmt::Display for FactionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Neutral => "neutral",
            Self::Ally => "ally",
            Self::Enemy => "enemy",
        })
    }
}

// ---------------------------------------------------------------------------
// Settlement sync entries
// ---------------------------------------------------------------------------

/// One `tile:name:faction` triple of a full settlement sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementEntry {
    pub tile: TileId,
    /// Display name, used verbatim.
    pub name: String,
    pub faction: FactionTag,
}

impl SettlementEntry {
    /// Parses one triple.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedEntry`] on a wrong field count, a
    /// non-numeric tile id, or an unknown faction code.
    pub fn parse(entry: &str) -> Result<Self, ProtocolError> {
        let malformed = |reason: &str| ProtocolError::MalformedEntry {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = entry.split(ENTRY_SEPARATOR).collect();
        let [tile, name, code] = parts.as_slice() else {
            return Err(malformed(&format!("expected 3 fields, got {}", parts.len())));
        };

        let tile: TileId = tile.parse().map_err(|_| malformed("tile id is not a number"))?;
        let faction = code
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(FactionTag::from_code)
            .ok_or_else(|| malformed("faction code must be 0, 1 or 2"))?;

        Ok(Self {
            tile,
            name: name.to_string(),
            faction,
        })
    }
}

impl fmt::Display for SettlementEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{ENTRY_SEPARATOR}{}{ENTRY_SEPARATOR}{}",
            self.tile,
            self.name,
            self.faction.code()
        )
    }
}

/// Parses the body of a full sync (the part after the verb prefix).
///
/// Blank entries are ignored. Every other entry yields its own result so
/// a single malformed triple never hides the rest of the batch.
pub fn parse_settlement_list(body: &str) -> Vec<Result<SettlementEntry, ProtocolError>> {
    body.split(FIELD_SEPARATOR)
        .filter(|entry| !entry.trim().is_empty())
        .map(SettlementEntry::parse)
        .collect()
}

// ---------------------------------------------------------------------------
// GiftedItem
// ---------------------------------------------------------------------------

/// An item grant: id, stack size and quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftedItem {
    pub item_id: String,
    pub quantity: u32,
    pub quality: String,
}

impl GiftedItem {
    /// Encodes the gift as a single field: `id┼quantity┼quality┼`.
    pub fn to_field(&self) -> String {
        format!(
            "{}{SUB_FIELD_SEPARATOR}{}{SUB_FIELD_SEPARATOR}{}{SUB_FIELD_SEPARATOR}",
            self.item_id, self.quantity, self.quality
        )
    }

    /// Decodes a single `id┼quantity┼quality┼` field.
    pub fn from_field(field: &str) -> Result<Self, ProtocolError> {
        let invalid = || ProtocolError::InvalidMessage(format!("malformed gift `{field}`"));

        let mut parts = field
            .split(SUB_FIELD_SEPARATOR)
            .filter(|part| !part.is_empty());
        let item_id = parts.next().ok_or_else(invalid)?;
        let quantity = parts
            .next()
            .and_then(|q| q.trim().parse().ok())
            .ok_or_else(invalid)?;
        let quality = parts.next().ok_or_else(invalid)?;

        Ok(Self {
            item_id: item_id.to_string(),
            quantity,
            quality: quality.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// DisconnectReason
// ---------------------------------------------------------------------------

/// Why the server is closing a peer's connection.
///
/// Travels as the free-text field of a `Disconnect` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server is shutting down.
    Closing,
    /// An operator kicked the peer.
    Kicked,
    /// The peer's address was banned.
    Banned,
    /// Player data is being wiped.
    Wiped,
    /// No record arrived within the idle timeout.
    Idle,
    /// The whitelist is on and the peer is not on it.
    Whitelist,
    /// The server is at capacity.
    Full,
    /// The credential did not match the saved record.
    Credentials,
    /// The username already has a live connection.
    AlreadyConnected,
    /// Anything else, kept verbatim.
    Other(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closing => "Closing",
            Self::Kicked => "Kicked",
            Self::Banned => "Banned",
            Self::Wiped => "Wiped",
            Self::Idle => "Idle",
            Self::Whitelist => "Whitelist",
            Self::Full => "Full",
            Self::Credentials => "Credentials",
            Self::AlreadyConnected => "AlreadyConnected",
            Self::Other(text) => text,
        })
    }
}

impl From<&str> for DisconnectReason {
    fn from(text: &str) -> Self {
        match text {
            "Closing" => Self::Closing,
            "Kicked" => Self::Kicked,
            "Banned" => Self::Banned,
            "Wiped" => Self::Wiped,
            "Idle" => Self::Idle,
            "Whitelist" => Self::Whitelist,
            "Full" => Self::Full,
            "Credentials" => Self::Credentials,
            "AlreadyConnected" => Self::AlreadyConnected,
            other => Self::Other(other.to_string()),
        }
    }
}

//! Wire protocol for Outpost.
//!
//! This crate defines the "language" that the server and its peers speak:
//!
//! - **Records** ([`Record`]): an already-decoded record: the ordered
//!   list of fields that made up one wire string.
//! - **Typed messages** ([`ServerRecord`], [`PeerRecord`]): what each
//!   verb means, with structured payloads.
//! - **Codec** ([`Codec`] trait, [`DelimitedCodec`]): how records are
//!   split from and joined into wire strings.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Codec (Record) → ServerRecord / PeerRecord
//! ```
//!
//! # Wire format
//!
//! Top-level fields are joined by [`FIELD_SEPARATOR`] (`│`). The first
//! field is always the verb. Gift payloads split one field further with
//! [`SUB_FIELD_SEPARATOR`] (`┼`), and settlement sync entries are
//! `tile:name:faction` triples joined by [`ENTRY_SEPARATOR`] (`:`).

mod codec;
mod error;
mod message;
mod record;
mod types;

pub use codec::{Codec, DelimitedCodec};
pub use error::ProtocolError;
pub use message::{PeerRecord, ServerRecord};
pub use record::Record;
pub use types::{
    DisconnectReason, FactionTag, GiftedItem, SettlementEntry, TileId,
    parse_settlement_list,
};

/// Separator between top-level fields of a record.
pub const FIELD_SEPARATOR: char = '│';

/// Separator between the sub-fields of a gift payload.
pub const SUB_FIELD_SEPARATOR: char = '┼';

/// Separator inside a single settlement sync entry.
pub const ENTRY_SEPARATOR: char = ':';

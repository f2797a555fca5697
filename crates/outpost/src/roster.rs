//! The server's settlement roster: which player owns which tile.
//!
//! This is the authority every peer's settlement index converges to.
//! It is derived from the saved clients' home tiles and kept current as
//! peers found and abandon settlements.

use std::collections::BTreeMap;

use outpost_protocol::{FactionTag, SettlementEntry, TileId};

/// Tile → owner username.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SettlementRoster {
    owners: BTreeMap<TileId, String>,
}

impl SettlementRoster {
    /// Builds a roster from `(tile, owner)` pairs. On a tile claimed twice
    /// the first owner wins.
    pub fn from_homes<'a, I>(homes: I) -> Self
    where
        I: IntoIterator<Item = (TileId, &'a str)>,
    {
        let mut owners = BTreeMap::new();
        for (tile, owner) in homes {
            owners.entry(tile).or_insert_with(|| owner.to_string());
        }
        Self { owners }
    }

    pub fn owner(&self, tile: TileId) -> Option<&str> {
        self.owners.get(&tile).map(String::as_str)
    }

    /// Claims a tile. Returns `false` if another player already owns it.
    pub fn claim(&mut self, tile: TileId, owner: &str) -> bool {
        match self.owners.get(&tile) {
            Some(current) if current != owner => false,
            _ => {
                self.owners.insert(tile, owner.to_string());
                true
            }
        }
    }

    /// Releases a tile. Returns the previous owner.
    pub fn release(&mut self, tile: TileId) -> Option<String> {
        self.owners.remove(&tile)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileId, &str)> {
        self.owners.iter().map(|(t, o)| (*t, o.as_str()))
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// The full-sync list for `viewer`: every settlement except the
    /// viewer's own, all neutral, named after their owner.
    pub fn sync_for(&self, viewer: &str) -> Vec<SettlementEntry> {
        self.owners
            .iter()
            .filter(|(_, owner)| owner.as_str() != viewer)
            .map(|(tile, owner)| SettlementEntry {
                tile: *tile,
                name: format!("{owner}'s Settlement"),
                faction: FactionTag::Neutral,
            })
            .collect()
    }
}

//! The authoritative settlement index: three faction buckets and the
//! aggregate index.
//!
//! Invariants maintained by every operation here:
//! - a tile id sits in at most one bucket;
//! - the aggregate index holds exactly the union of the buckets, with no
//!   duplicate tile id.
//!
//! Order is observable. Buckets keep insertion order, and a full sync
//! rebuilds the aggregate as neutral, then ally, then enemy.

use outpost_protocol::{FactionTag, ProtocolError, SettlementEntry, TileId};

/// Suffix appended to a player's name to form a settlement's display name.
const DISPLAY_SUFFIX: &str = "'s Settlement";

/// One indexed settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub tile: TileId,
    pub display_name: String,
    pub faction: FactionTag,
}

impl Settlement {
    /// Display name the game shows for a player's settlement.
    pub fn display_name_for(base_name: &str) -> String {
        format!("{base_name}{DISPLAY_SUFFIX}")
    }
}

/// Outcome of a full sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries placed into a bucket.
    pub applied: usize,
    /// Malformed or duplicate entries that were dropped.
    pub skipped: usize,
}

/// Faction buckets plus the aggregate index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementIndex {
    neutral: Vec<Settlement>,
    ally: Vec<Settlement>,
    enemy: Vec<Settlement>,
    all: Vec<Settlement>,
}

impl SettlementIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bucket for one faction, in insertion order.
    pub fn bucket(&self, faction: FactionTag) -> &[Settlement] {
        match faction {
            FactionTag::Neutral => &self.neutral,
            FactionTag::Ally => &self.ally,
            FactionTag::Enemy => &self.enemy,
        }
    }

    fn bucket_mut(&mut self, faction: FactionTag) -> &mut Vec<Settlement> {
        match faction {
            FactionTag::Neutral => &mut self.neutral,
            FactionTag::Ally => &mut self.ally,
            FactionTag::Enemy => &mut self.enemy,
        }
    }

    /// The aggregate index, in its observable order.
    pub fn all(&self) -> &[Settlement] {
        &self.all
    }

    /// Looks a tile up in the aggregate index.
    pub fn get(&self, tile: TileId) -> Option<&Settlement> {
        self.all.iter().find(|s| s.tile == tile)
    }

    /// Returns `true` if the tile is indexed.
    pub fn contains(&self, tile: TileId) -> bool {
        self.get(tile).is_some()
    }

    /// Number of indexed settlements.
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Returns `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Adds a settlement to the neutral bucket and the aggregate index.
    ///
    /// Returns `false` (and changes nothing) if the tile is already indexed.
    pub(crate) fn insert_neutral(&mut self, tile: TileId, display_name: String) -> bool {
        if self.contains(tile) {
            return false;
        }
        let settlement = Settlement {
            tile,
            display_name,
            faction: FactionTag::Neutral,
        };
        self.neutral.push(settlement.clone());
        self.all.push(settlement);
        true
    }

    /// Removes a tile from `faction`'s bucket and from the aggregate index.
    ///
    /// The caller picks the bucket; it is not re-derived from the index.
    /// Returns the aggregate entry that was removed, if any.
    pub(crate) fn remove(&mut self, faction: FactionTag, tile: TileId) -> Option<Settlement> {
        self.bucket_mut(faction).retain(|s| s.tile != tile);
        let position = self.all.iter().position(|s| s.tile == tile)?;
        Some(self.all.remove(position))
    }

    /// Clears every bucket and the aggregate index.
    pub(crate) fn clear(&mut self) {
        self.neutral.clear();
        self.ally.clear();
        self.enemy.clear();
        self.all.clear();
    }

    /// Replaces the whole index with an authoritative list.
    ///
    /// Malformed entries and repeats of an already-placed tile are skipped
    /// with a warning; the rest of the batch is still applied.
    pub(crate) fn replace_all<I>(&mut self, entries: I) -> SyncReport
    where
        I: IntoIterator<Item = Result<SettlementEntry, ProtocolError>>,
    {
        self.clear();
        let mut report = SyncReport::default();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed settlement entry");
                    report.skipped += 1;
                    continue;
                }
            };

            let placed = FactionTag::ALL
                .iter()
                .any(|tag| self.bucket(*tag).iter().any(|s| s.tile == entry.tile));
            if placed {
                tracing::warn!(tile = %entry.tile, "skipping duplicate settlement entry");
                report.skipped += 1;
                continue;
            }

            self.bucket_mut(entry.faction).push(Settlement {
                tile: entry.tile,
                display_name: entry.name,
                faction: entry.faction,
            });
            report.applied += 1;
        }

        for tag in FactionTag::ALL {
            let bucket = self.bucket(tag).to_vec();
            self.all.extend(bucket);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tile: u32, name: &str, faction: FactionTag) -> Result<SettlementEntry, ProtocolError> {
        Ok(SettlementEntry {
            tile: TileId(tile),
            name: name.into(),
            faction,
        })
    }

    fn tiles(settlements: &[Settlement]) -> Vec<u32> {
        settlements.iter().map(|s| s.tile.0).collect()
    }

    #[test]
    fn test_insert_neutral_duplicate_is_rejected() {
        let mut index = SettlementIndex::new();
        assert!(index.insert_neutral(TileId(1), "A's Settlement".into()));
        assert!(!index.insert_neutral(TileId(1), "B's Settlement".into()));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(TileId(1)).unwrap().display_name, "A's Settlement");
    }

    #[test]
    fn test_replace_all_orders_aggregate_by_bucket() {
        let mut index = SettlementIndex::new();
        let report = index.replace_all([
            entry(3, "Enemy", FactionTag::Enemy),
            entry(1, "Ally", FactionTag::Ally),
            entry(2, "Neutral", FactionTag::Neutral),
            entry(4, "Ally2", FactionTag::Ally),
        ]);

        assert_eq!(report, SyncReport { applied: 4, skipped: 0 });
        assert_eq!(tiles(index.all()), vec![2, 1, 4, 3]);
    }

    #[test]
    fn test_replace_all_clears_previous_contents() {
        let mut index = SettlementIndex::new();
        index.insert_neutral(TileId(9), "Old's Settlement".into());

        index.replace_all([entry(1, "New", FactionTag::Ally)]);

        assert!(!index.contains(TileId(9)));
        assert!(index.bucket(FactionTag::Neutral).is_empty());
        assert_eq!(tiles(index.bucket(FactionTag::Ally)), vec![1]);
    }

    #[test]
    fn test_replace_all_skips_duplicate_tile() {
        let mut index = SettlementIndex::new();
        let report = index.replace_all([
            entry(5, "First", FactionTag::Neutral),
            entry(5, "Second", FactionTag::Enemy),
        ]);

        assert_eq!(report, SyncReport { applied: 1, skipped: 1 });
        assert_eq!(index.len(), 1);
        assert!(index.bucket(FactionTag::Enemy).is_empty());
    }

    #[test]
    fn test_replace_all_skips_malformed_without_aborting() {
        let mut index = SettlementIndex::new();
        let report = index.replace_all([
            entry(1, "A", FactionTag::Neutral),
            Err(ProtocolError::Empty),
            entry(2, "B", FactionTag::Enemy),
        ]);

        assert_eq!(report, SyncReport { applied: 2, skipped: 1 });
        assert_eq!(tiles(index.all()), vec![1, 2]);
    }

    #[test]
    fn test_remove_uses_given_bucket() {
        let mut index = SettlementIndex::new();
        index.replace_all([entry(1, "A", FactionTag::Ally)]);

        let removed = index.remove(FactionTag::Ally, TileId(1));

        assert_eq!(removed.map(|s| s.tile), Some(TileId(1)));
        assert!(index.is_empty());
        assert!(index.bucket(FactionTag::Ally).is_empty());
    }

    #[test]
    fn test_display_name_for() {
        assert_eq!(Settlement::display_name_for("Steve"), "Steve's Settlement");
    }
}

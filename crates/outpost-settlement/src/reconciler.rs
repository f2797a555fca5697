use outpost_protocol::{FactionTag, ProtocolError, ServerRecord, SettlementEntry, TileId};

use crate::error::SettlementError;
use crate::index::{Settlement, SettlementIndex, SyncReport};
use crate::world::World;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tracked objects destroyed.
    pub destroyed: usize,
    /// Objects created from the buckets.
    pub created: usize,
}

/// Applies settlement events to the index and converges a [`World`] to it.
///
/// Not synchronized. Confine one instance to one task (see
/// [`spawn_reconciler`](crate::spawn_reconciler)) or guard it externally.
#[derive(Debug)]
pub struct SettlementReconciler<W: World> {
    index: SettlementIndex,
    world: W,
}

impl<W: World> SettlementReconciler<W> {
    pub fn new(world: W) -> Self {
        Self {
            index: SettlementIndex::new(),
            world,
        }
    }

    pub fn index(&self) -> &SettlementIndex {
        &self.index
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// Registers a settlement founded by another player.
    ///
    /// The new settlement is neutral, named `"<base_name>'s Settlement"`,
    /// and materialized right away.
    ///
    /// # Errors
    /// [`SettlementError::Duplicate`] if the tile is already indexed. Nothing
    /// is inserted in that case.
    pub fn create(&mut self, tile: TileId, base_name: &str) -> Result<(), SettlementError> {
        let display_name = Settlement::display_name_for(base_name);
        if !self.index.insert_neutral(tile, display_name.clone()) {
            return Err(SettlementError::Duplicate(tile));
        }

        let object = self
            .world
            .make_settlement(tile, &display_name, FactionTag::Neutral);
        self.world.add(object);

        tracing::debug!(%tile, name = %display_name, "settlement created");
        Ok(())
    }

    /// Destroys the settlement at `tile` and drops it from the index.
    ///
    /// The bucket comes from the live object's current owner, which may
    /// differ from what the index last recorded. Without a live tracked
    /// object this is a no-op and returns `None`.
    pub fn remove(&mut self, tile: TileId) -> Option<FactionTag> {
        let tracked: Vec<_> = self
            .world
            .settlements()
            .into_iter()
            .filter(|object| object.tile == tile && object.owner.is_some())
            .collect();
        let owner = tracked.first().and_then(|object| object.owner)?;

        for object in &tracked {
            self.world.remove(object.id);
        }
        self.index.remove(owner, tile);
        tracing::debug!(%tile, faction = %owner, "settlement removed");
        Some(owner)
    }

    /// Replaces the index with an authoritative list.
    ///
    /// Only the index changes; call [`reconcile`](Self::reconcile) to
    /// bring the world along.
    pub fn full_sync<I>(&mut self, entries: I) -> SyncReport
    where
        I: IntoIterator<Item = Result<SettlementEntry, ProtocolError>>,
    {
        let report = self.index.replace_all(entries);
        tracing::debug!(
            applied = report.applied,
            skipped = report.skipped,
            "settlement index replaced"
        );
        report
    }

    /// Converges the world to the buckets.
    ///
    /// Every tracked object is destroyed and every bucket entry recreated,
    /// including tiles whose content did not change. All destruction
    /// happens before any insertion, so no tile ever carries two tracked
    /// objects afterwards. Untracked objects are left alone.
    pub fn reconcile(&mut self) -> ReconcileReport {
        let old: Vec<_> = self
            .world
            .settlements()
            .into_iter()
            .filter(|object| object.owner.is_some())
            .map(|object| object.id)
            .collect();

        let mut fresh = Vec::with_capacity(self.index.len());
        for tag in FactionTag::ALL {
            for settlement in self.index.bucket(tag) {
                fresh.push(
                    self.world
                        .make_settlement(settlement.tile, &settlement.display_name, tag),
                );
            }
        }

        let mut report = ReconcileReport::default();
        for id in old {
            if self.world.remove(id) {
                report.destroyed += 1;
            }
        }
        for object in fresh {
            self.world.add(object);
            report.created += 1;
        }

        tracing::trace!(
            destroyed = report.destroyed,
            created = report.created,
            "reconciliation pass"
        );
        report
    }

    /// Applies one settlement record. Other records are ignored.
    ///
    /// Returns `true` if the record was a settlement record, whether or not
    /// it changed anything.
    pub fn apply(&mut self, record: ServerRecord) -> bool {
        match record {
            ServerRecord::SettlementAdd { tile, base_name } => {
                if let Err(e) = self.create(tile, &base_name) {
                    tracing::warn!(error = %e, "ignoring settlement create");
                }
                true
            }
            ServerRecord::SettlementRemove { tile } => {
                if self.remove(tile).is_none() {
                    tracing::debug!(%tile, "remove for unknown settlement ignored");
                }
                true
            }
            ServerRecord::SettlementSync(entries) => {
                self.full_sync(entries);
                true
            }
            _ => false,
        }
    }
}

//! The materialization seam.
//!
//! Whatever renders the shared map (the game itself, or a headless peer)
//! implements [`World`]. The reconciler only ever lists, creates, adds
//! and removes settlement objects through it.

use std::fmt;

use outpost_protocol::{FactionTag, TileId};

/// Identity of one materialized object instance.
///
/// Two objects on the same tile created by different reconciliation
/// passes have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj-{}", self.0)
    }
}

/// A settlement object as the world holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSettlement {
    pub id: ObjectId,
    pub tile: TileId,
    pub name: String,
    /// The owning faction when it is one of the three tracked factions;
    /// `None` for settlements the overlay does not manage (the local
    /// player's own colony, scenario factions, ...).
    pub owner: Option<FactionTag>,
}

/// Renderer-side primitives for settlement objects.
///
/// `Send + 'static` so a world can be moved into the reconciler task.
pub trait World: Send + 'static {
    /// Every settlement object currently in the world.
    fn settlements(&self) -> Vec<WorldSettlement>;

    /// Builds a new settlement object without placing it.
    fn make_settlement(&mut self, tile: TileId, name: &str, faction: FactionTag) -> WorldSettlement;

    /// Places a previously made object into the world.
    fn add(&mut self, settlement: WorldSettlement);

    /// Removes an object. Returns `false` if it was not present.
    fn remove(&mut self, id: ObjectId) -> bool;
}

/// A [`World`] that keeps objects in memory.
///
/// Used by headless peers and by tests.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    objects: Vec<WorldSettlement>,
    next_id: u64,
}

impl MemoryWorld {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a settlement the overlay does not manage.
    pub fn add_untracked(&mut self, tile: TileId, name: &str) -> ObjectId {
        let id = self.next_object_id();
        self.objects.push(WorldSettlement {
            id,
            tile,
            name: name.to_string(),
            owner: None,
        });
        id
    }

    /// Changes an object's owner in place, the way game events can.
    pub fn set_owner(&mut self, id: ObjectId, owner: Option<FactionTag>) -> bool {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(object) => {
                object.owner = owner;
                true
            }
            None => false,
        }
    }

    /// Objects on one tile.
    pub fn at(&self, tile: TileId) -> Vec<&WorldSettlement> {
        self.objects.iter().filter(|o| o.tile == tile).collect()
    }

    fn next_object_id(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }
}

impl World for MemoryWorld {
    fn settlements(&self) -> Vec<WorldSettlement> {
        self.objects.clone()
    }

    fn make_settlement(&mut self, tile: TileId, name: &str, faction: FactionTag) -> WorldSettlement {
        WorldSettlement {
            id: self.next_object_id(),
            tile,
            name: name.to_string(),
            owner: Some(faction),
        }
    }

    fn add(&mut self, settlement: WorldSettlement) {
        self.objects.push(settlement);
    }

    fn remove(&mut self, id: ObjectId) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.id != id);
        self.objects.len() != before
    }
}

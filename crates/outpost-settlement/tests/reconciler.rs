//! Integration tests for settlement reconciliation, driven by wire records.

use std::collections::BTreeMap;

use outpost_protocol::{Codec, DelimitedCodec, ServerRecord};
use outpost_settlement::{
    FactionTag, MemoryWorld, SettlementIndex, SettlementReconciler, TileId, World, WorldSettlement,
    spawn_reconciler,
};

// =========================================================================
// Helpers
// =========================================================================

fn decode(wire: &str) -> ServerRecord {
    DelimitedCodec::default().decode_server(wire).unwrap()
}

/// The observable world state: tile → (faction, name).
fn observable(objects: &[WorldSettlement]) -> BTreeMap<TileId, (Option<FactionTag>, String)> {
    objects
        .iter()
        .map(|o| (o.tile, (o.owner, o.name.clone())))
        .collect()
}

fn assert_partitioned(index: &SettlementIndex) {
    for settlement in index.all() {
        let hits = FactionTag::ALL
            .iter()
            .filter(|tag| index.bucket(**tag).iter().any(|s| s.tile == settlement.tile))
            .count();
        assert_eq!(hits, 1, "tile {} must sit in exactly one bucket", settlement.tile);
        assert_eq!(
            index.all().iter().filter(|s| s.tile == settlement.tile).count(),
            1,
            "tile {} must appear once in the aggregate",
            settlement.tile
        );
    }
    let bucket_total: usize = FactionTag::ALL.iter().map(|t| index.bucket(*t).len()).sum();
    assert_eq!(bucket_total, index.len());
}

// =========================================================================
// Direct reconciler
// =========================================================================

#[test]
fn test_create_record_scenario() {
    let mut r = SettlementReconciler::new(MemoryWorld::new());
    r.apply(decode("Settlement│Add│4821│Steve"));

    let neutral = r.index().bucket(FactionTag::Neutral);
    assert_eq!(neutral.len(), 1);
    assert_eq!(neutral[0].tile, TileId(4821));
    assert_eq!(neutral[0].display_name, "Steve's Settlement");
    assert_eq!(r.index().get(TileId(4821)).unwrap().faction, FactionTag::Neutral);
}

#[test]
fn test_full_sync_record_scenario() {
    let mut r = SettlementReconciler::new(MemoryWorld::new());
    r.apply(decode("Settlements│100:Alpha:0│200:Bravo:1│300:Charlie:2"));

    let index = r.index();
    assert_eq!(index.len(), 3);
    assert_eq!(index.bucket(FactionTag::Neutral)[0].tile, TileId(100));
    assert_eq!(index.bucket(FactionTag::Ally)[0].tile, TileId(200));
    assert_eq!(index.bucket(FactionTag::Enemy)[0].tile, TileId(300));
    let factions: Vec<_> = index.all().iter().map(|s| s.faction).collect();
    assert_eq!(factions, vec![FactionTag::Neutral, FactionTag::Ally, FactionTag::Enemy]);
    assert_partitioned(index);
}

#[test]
fn test_full_sync_malformed_entries_skipped() {
    let mut r = SettlementReconciler::new(MemoryWorld::new());
    r.apply(decode("Settlements│1:A:0│x:B:1│2:C│3:D:9│4:E:2"));

    let tiles: Vec<_> = r.index().all().iter().map(|s| s.tile.0).collect();
    assert_eq!(tiles, vec![1, 4]);
    assert_partitioned(r.index());
}

#[test]
fn test_full_sync_then_partition_holds_after_mixed_events() {
    let mut r = SettlementReconciler::new(MemoryWorld::new());
    r.apply(decode("Settlements│10:A:2│11:B:1│12:C:0"));
    r.reconcile();
    r.apply(decode("Settlement│Add│13│Dana"));
    r.apply(decode("Settlement│Add│11│Dup"));
    r.apply(decode("Settlement│Remove│10"));
    r.reconcile();

    assert_partitioned(r.index());
    let tiles: Vec<_> = r.index().all().iter().map(|s| s.tile.0).collect();
    assert_eq!(tiles, vec![12, 11, 13]);
}

#[test]
fn test_reconcile_twice_same_observable_state() {
    let mut r = SettlementReconciler::new(MemoryWorld::new());
    r.world_mut().add_untracked(TileId(1), "Home");
    r.apply(decode("Settlements│100:Alpha:0│200:Bravo:1│300:Charlie:2"));

    r.reconcile();
    let first = r.world().settlements();
    r.reconcile();
    let second = r.world().settlements();

    assert_eq!(observable(&first), observable(&second));
    // Tracked objects are new instances; the untracked one is untouched.
    let ids = |objects: &[WorldSettlement]| {
        objects
            .iter()
            .filter(|o| o.owner.is_some())
            .map(|o| o.id)
            .collect::<Vec<_>>()
    };
    assert!(ids(&first).iter().all(|id| !ids(&second).contains(id)));
}

#[test]
fn test_reconcile_never_leaves_two_objects_on_a_tile() {
    let mut r = SettlementReconciler::new(MemoryWorld::new());
    r.apply(decode("Settlement│Add│5│Eve"));
    r.apply(decode("Settlements│5:Eve's Settlement:2"));
    r.reconcile();

    let on_tile = r.world().at(TileId(5));
    assert_eq!(on_tile.len(), 1);
    assert_eq!(on_tile[0].owner, Some(FactionTag::Enemy));
}

#[test]
fn test_remove_absent_leaves_everything_unchanged() {
    let mut r = SettlementReconciler::new(MemoryWorld::new());
    r.apply(decode("Settlements│1:A:0│2:B:1"));
    r.reconcile();
    let index_before = r.index().clone();
    let world_before = observable(&r.world().settlements());

    r.apply(decode("Settlement│Remove│999"));

    assert_eq!(r.index(), &index_before);
    assert_eq!(observable(&r.world().settlements()), world_before);
}

// =========================================================================
// Actor
// =========================================================================

#[tokio::test]
async fn test_actor_apply_reconciles_world() {
    let handle = spawn_reconciler(MemoryWorld::new(), 16);

    let report = handle
        .apply(decode("Settlements│100:Alpha:0│200:Bravo:1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.created, 2);

    let world = handle.world().await.unwrap();
    assert_eq!(world.len(), 2);
    let index = handle.index().await.unwrap();
    assert_eq!(index.len(), 2);
}

#[tokio::test]
async fn test_actor_remove_destroys_object() {
    let handle = spawn_reconciler(MemoryWorld::new(), 16);
    handle.apply(decode("Settlement│Add│7│Gus")).await.unwrap();

    handle.apply(decode("Settlement│Remove│7")).await.unwrap();

    assert!(handle.world().await.unwrap().is_empty());
    assert!(handle.index().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_actor_non_settlement_record_returns_none() {
    let handle = spawn_reconciler(MemoryWorld::new(), 16);
    let report = handle.apply(ServerRecord::Pong).await.unwrap();
    assert!(report.is_none());
}

#[tokio::test]
async fn test_actor_shutdown_makes_handle_unavailable() {
    let handle = spawn_reconciler(MemoryWorld::new(), 16);
    handle.shutdown().await.unwrap();
    // Give the task a moment to exit and drop its receiver.
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert!(handle.reconcile().await.is_err());
}

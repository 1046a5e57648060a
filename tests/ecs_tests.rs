//! Integration tests for component stores, merge joins and systems.

mod common;

use rstest::rstest;

use glam::Vec3;
use scene_engine::ecs::{merge, ComponentStore, Entity, EntityManager, Physics, Stores, StoreError, Transform};
use scene_engine::systems;

fn e(raw: u32) -> Entity {
    Entity::from_raw(raw)
}

// ============================================================================
// Store Tests
// ============================================================================

/// Interleaved inserts, removals and compactions keep ids ascending.
#[rstest]
#[case::ascending(&[1, 2, 3, 4, 5], &[2, 4])]
#[case::descending(&[9, 7, 5, 3, 1], &[7])]
#[case::shuffled(&[4, 1, 8, 3, 6, 2], &[1, 8, 6])]
#[case::reinsert_removed(&[5, 3, 5, 3, 1], &[5])]
fn test_store_stays_sorted(#[case] inserts: &[u32], #[case] removals: &[u32]) {
    common::init_logging();
    let mut store = ComponentStore::new();
    for (n, &id) in inserts.iter().enumerate() {
        // Re-inserting a live id is a duplicate; remove first
        if store.contains(e(id)) {
            assert_eq!(store.insert(e(id), n), Err(StoreError::Duplicate(e(id))));
            assert!(store.mark_invalid(e(id)));
        }
        store.insert(e(id), n).unwrap();
        assert!(store.is_sorted());
    }
    for &id in removals {
        assert!(store.mark_invalid(e(id)));
        assert!(store.is_sorted());
        assert!(store.get(e(id)).is_none());
    }
    store.compact();
    assert!(store.is_sorted());
    assert_eq!(store.slot_count(), store.len());
    let ids: Vec<u32> = store.entities().map(Entity::raw).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

/// Merge iteration visits each id live in both stores once, ascending.
#[test]
fn test_merge_visits_common_live_ids() {
    let mut left = ComponentStore::new();
    let mut right = ComponentStore::new();
    for id in [1, 2, 4, 6, 7, 9] {
        left.insert(e(id), id).unwrap();
    }
    for id in [2, 3, 4, 7, 9, 10] {
        right.insert(e(id), id * 10).unwrap();
    }
    left.mark_invalid(e(7));
    right.mark_invalid(e(4));
    // A stale slot followed by a live one of the same id
    right.mark_invalid(e(9));
    right.insert(e(9), 99).unwrap();

    let visited: Vec<(u32, u32, u32)> = merge(&left, &right).map(|(id, a, b)| (id.raw(), *a, *b)).collect();
    assert_eq!(visited, [(2, 2, 20), (9, 9, 99)]);
}

// ============================================================================
// System Tests
// ============================================================================

/// Transforms {1,3,5} and physics {3,4} with 4 invalid: only entity 3 moves.
#[test]
fn test_physics_applies_only_to_matching_live_ids() {
    let mut stores = Stores::default();
    for id in [1, 3, 5] {
        stores.transforms.insert(e(id), Transform::from_position(Vec3::splat(id as f32))).unwrap();
    }
    stores.physics.insert(e(3), Physics::with_velocity(Vec3::X)).unwrap();
    stores.physics.insert(e(4), Physics::with_velocity(Vec3::Y)).unwrap();
    assert!(stores.physics.mark_invalid(e(4)));

    assert_eq!(systems::physics::integrate(&mut stores, 0.5), 1);

    let position = |id| stores.transforms.get(e(id)).unwrap().position();
    assert_eq!(position(1), Vec3::splat(1.0));
    assert_eq!(position(3), Vec3::new(3.5, 3.0, 3.0));
    assert_eq!(position(5), Vec3::splat(5.0));
}

/// Removed entities leave no components behind after the frame boundary.
#[test]
fn test_removal_happens_at_frame_boundary() {
    let mut entities = EntityManager::new();
    let parent = entities.create_entity("parent");
    let child = entities.create_entity("child");
    let other = entities.create_entity("other");
    for entity in [parent, child, other] {
        entities.add_component(entity, Transform::default()).unwrap();
        entities.add_component(entity, Physics::with_velocity(Vec3::Z)).unwrap();
    }
    entities.set_parent(child, Some(parent)).unwrap();

    assert!(entities.destroy_entity(parent));
    // Still alive until the boundary
    assert!(entities.is_alive(child));
    systems::run_frame(&mut entities, 1.0, 1.0);

    assert_eq!(entities.remove_entities_marked(), 2);
    assert!(!entities.is_alive(parent));
    assert!(!entities.is_alive(child));
    assert!(entities.get::<Physics>(child).is_none());
    assert_eq!(entities.stores().transforms.slot_count(), 1);
    assert_eq!(entities.get::<Transform>(other).unwrap().position(), Vec3::Z);
}

/// Asking for a component an entity never had is a plain miss.
#[test]
fn test_missing_component_is_not_an_error() {
    let mut entities = EntityManager::new();
    let lonely = entities.create_entity("lonely");
    assert!(entities.get::<Physics>(lonely).is_none());
    assert!(!entities.remove_component::<Physics>(lonely));
    assert!(entities.get::<Transform>(e(999)).is_none());
}

//! Hierarchy propagation and bounds refresh

use crate::ecs::{merge_join_left_mut, Entity, Stores};
use glam::Mat4;

/// Recompute world matrices of dirty subtrees, then refresh mesh and
/// collider bounds of entities whose transform moved or whose local shape
/// changed. Clears all dirty flags.
///
/// Returns the number of world matrices recomputed.
pub fn propagate(stores: &mut Stores) -> usize {
    let transforms = &mut stores.transforms;
    let roots: Vec<Entity> = transforms
        .iter()
        .filter(|(_, t)| t.parent().is_none())
        .map(|(e, _)| e)
        .collect();

    let mut recomputed = 0;
    let mut stack: Vec<(Entity, Mat4, bool)> =
        roots.into_iter().rev().map(|e| (e, Mat4::IDENTITY, false)).collect();
    while let Some((entity, parent_world, parent_dirty)) = stack.pop() {
        let Some(transform) = transforms.get_mut(entity) else {
            continue;
        };
        let dirty = parent_dirty || transform.is_updated();
        if dirty {
            transform.set_world_matrix(parent_world * transform.local_matrix());
            transform.invalidate_mesh_bounds();
            transform.invalidate_collider_bounds();
            recomputed += 1;
        }
        let world = transform.world_matrix();
        stack.extend(transform.children().iter().rev().map(|c| (*c, world, dirty)));
    }

    merge_join_left_mut(&mut stores.meshes, &stores.transforms, |_, mesh, transform| {
        if transform.mesh_bounds_outdated() || mesh.bounds_outdated() {
            mesh.update_world_bounds(transform.world_matrix());
        }
    });
    merge_join_left_mut(&mut stores.colliders, &stores.transforms, |_, collider, transform| {
        if transform.collider_bounds_outdated() || collider.bounds_outdated() {
            collider.update_bounds(transform.world_matrix());
        }
    });

    for (_, transform) in stores.transforms.iter_mut() {
        transform.clear_updated();
        transform.clear_mesh_bounds_outdated();
        transform.clear_collider_bounds_outdated();
    }
    recomputed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{BoundingSphere, Collider, ColliderShape, EntityManager, MeshComponent, Transform};
    use crate::resources::{MaterialId, MeshId};
    use glam::Vec3;

    #[test]
    fn test_child_follows_parent() {
        let mut em = EntityManager::new();
        // Child gets the lower id so store order differs from hierarchy order
        let child = em.create_entity("child");
        let parent = em.create_entity("parent");
        em.add_component(child, Transform::from_position(Vec3::X)).unwrap();
        em.add_component(parent, Transform::from_position(Vec3::Y)).unwrap();
        em.set_parent(child, Some(parent)).unwrap();

        assert_eq!(propagate(em.stores_mut()), 2);
        let world = em.get::<Transform>(child).unwrap().world_position();
        assert!((world - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);

        assert_eq!(propagate(em.stores_mut()), 0, "nothing moved");

        em.get_mut::<Transform>(parent).unwrap().add_position(Vec3::Z);
        assert_eq!(propagate(em.stores_mut()), 2);
        let world = em.get::<Transform>(child).unwrap().world_position();
        assert!((world - Vec3::new(1.0, 1.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_collider_bounds_follow_transform() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_component(a, Transform::from_position(Vec3::new(5.0, 0.0, 0.0))).unwrap();
        em.add_component(a, Collider::new(ColliderShape::Sphere(1.0))).unwrap();
        propagate(em.stores_mut());

        let bounds = em.get::<Collider>(a).unwrap().bounds();
        assert!((bounds.centre - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-6);
        assert!((bounds.extents - Vec3::ONE).length() < 1e-6);
        assert!(!em.get::<Transform>(a).unwrap().collider_bounds_outdated());
    }

    #[test]
    fn test_local_shape_change_refreshes_bounds() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_component(a, Transform::from_position(Vec3::new(5.0, 0.0, 0.0))).unwrap();
        em.add_component(a, MeshComponent::new(MeshId(0), MaterialId(0), BoundingSphere::new(Vec3::ZERO, 1.0)))
            .unwrap();
        em.add_component(a, Collider::new(ColliderShape::Sphere(1.0))).unwrap();
        propagate(em.stores_mut());

        em.get_mut::<MeshComponent>(a)
            .unwrap()
            .set_local_bounds(BoundingSphere::new(Vec3::ZERO, 10.0));
        em.get_mut::<Collider>(a).unwrap().set_shape(ColliderShape::Sphere(3.0));
        assert_eq!(propagate(em.stores_mut()), 0, "the transform did not move");

        let bounds = em.get::<MeshComponent>(a).unwrap().world_bounds();
        assert_eq!(bounds, BoundingSphere::new(Vec3::new(5.0, 0.0, 0.0), 10.0));
        assert!((em.get::<Collider>(a).unwrap().bounds().extents - Vec3::splat(3.0)).length() < 1e-6);
        assert!(!em.get::<MeshComponent>(a).unwrap().bounds_outdated());
    }
}

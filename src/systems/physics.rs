//! Linear motion integration

use crate::ecs::{merge_join_mut, Stores};
use glam::Vec3;

/// Semi-implicit Euler step for every entity with a transform and physics.
/// Returns the number of entities visited.
pub fn integrate(stores: &mut Stores, dt: f32) -> usize {
    if dt <= 0.0 {
        return 0;
    }
    merge_join_mut(&mut stores.transforms, &mut stores.physics, |_, transform, physics| {
        physics.velocity += physics.acceleration * dt;
        let step = physics.velocity * dt;
        // Resting bodies must not dirty their transform every frame
        if step != Vec3::ZERO {
            transform.add_position(step);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{EntityManager, Physics, Transform};

    #[test]
    fn test_velocity_updates_before_position() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_component(a, Transform::default()).unwrap();
        em.add_component(
            a,
            Physics {
                acceleration: Vec3::new(0.0, -10.0, 0.0),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(integrate(em.stores_mut(), 0.5), 1);
        let p = em.get::<Transform>(a).unwrap().position();
        assert!((p.y - -2.5).abs() < 1e-6);
        assert_eq!(em.get::<Physics>(a).unwrap().velocity.y, -5.0);
    }

    #[test]
    fn test_resting_body_stays_clean() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_component(a, Transform::default()).unwrap();
        em.add_component(a, Physics::default()).unwrap();
        em.get_mut::<Transform>(a).unwrap().clear_updated();
        integrate(em.stores_mut(), 0.016);
        assert!(!em.get::<Transform>(a).unwrap().is_updated());
    }

    #[test]
    fn test_physics_without_transform_is_skipped() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        em.add_component(a, Physics::with_velocity(Vec3::X)).unwrap();
        assert_eq!(integrate(em.stores_mut(), 1.0), 0);
    }
}

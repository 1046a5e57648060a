//! Two-phase exchange of transform state with external scripts.
//!
//! Scripts never touch the stores directly. Before they run they get a
//! [`TransformSnapshot`] per entity; afterwards their [`TransformDelta`]s are
//! applied in one pass through the regular setters, so dirty flags stay
//! correct.

use super::components::Transform;
use super::entity::Entity;
use super::manager::EntityManager;
use glam::{Quat, Vec3};

/// Read-only copy of one transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSnapshot {
    pub entity: Entity,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

/// Requested change. `None` fields are left as they are.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransformDelta {
    pub entity: Entity,
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
}

impl TransformDelta {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }

    fn apply(&self, transform: &mut Transform) {
        if let Some(position) = self.position {
            transform.set_position(position);
        }
        if let Some(rotation) = self.rotation {
            transform.set_rotation(rotation);
        }
        if let Some(scale) = self.scale {
            transform.set_scale(scale);
        }
    }
}

impl EntityManager {
    /// Snapshot every live transform, in entity order.
    pub fn snapshot_transforms(&self) -> Vec<TransformSnapshot> {
        self.stores()
            .transforms
            .iter()
            .map(|(entity, t)| TransformSnapshot {
                entity,
                position: t.position(),
                rotation: t.rotation(),
                scale: t.scale(),
            })
            .collect()
    }

    /// Apply script results. Deltas for entities without a transform are
    /// dropped. Returns the number applied.
    pub fn apply_transform_deltas(&mut self, deltas: &[TransformDelta]) -> usize {
        let mut applied = 0;
        for delta in deltas {
            match self.stores_mut().transforms.get_mut(delta.entity) {
                Some(transform) => {
                    delta.apply(transform);
                    applied += 1;
                }
                None => log::debug!("Dropping transform delta for {}", delta.entity),
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_then_apply() {
        let mut em = EntityManager::new();
        let a = em.create_entity("a");
        let b = em.create_entity("b");
        em.add_component(a, Transform::from_position(Vec3::X)).unwrap();

        let snapshot = em.snapshot_transforms();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].entity, a);
        assert_eq!(snapshot[0].position, Vec3::X);

        let deltas = [
            TransformDelta::new(a).with_position(Vec3::Y),
            TransformDelta::new(b).with_position(Vec3::Z),
        ];
        assert_eq!(em.apply_transform_deltas(&deltas), 1);
        let t = em.get::<Transform>(a).unwrap();
        assert_eq!(t.position(), Vec3::Y);
        assert_eq!(t.scale(), Vec3::ONE);
        assert!(t.is_updated());
    }
}

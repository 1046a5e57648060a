//! Transform component

use crate::ecs::entity::Entity;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// Position, rotation and scale of an entity relative to its parent.
///
/// Fields are private: every mutation goes through a setter so the derived
/// data flags (`updated`, mesh and collider bounds) can never be skipped.
#[derive(Debug, Clone)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    parent: Option<Entity>,
    children: Vec<Entity>,
    updated: bool,
    mesh_bounds_outdated: bool,
    collider_bounds_outdated: bool,
    world: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            parent: None,
            children: Vec::new(),
            updated: true,
            mesh_bounds_outdated: true,
            collider_bounds_outdated: true,
            world: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation: rotation.normalize(),
            ..Default::default()
        }
    }

    pub fn from_position_scale(position: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            scale,
            ..Default::default()
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    fn touch(&mut self) {
        self.updated = true;
        self.mesh_bounds_outdated = true;
        self.collider_bounds_outdated = true;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.touch();
    }

    pub fn add_position(&mut self, offset: Vec3) {
        self.position += offset;
        self.touch();
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.touch();
    }

    /// Apply `delta` after the current rotation (world-space rotation).
    pub fn add_rotation(&mut self, delta: Quat) {
        self.rotation = (delta * self.rotation).normalize();
        self.touch();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.touch();
    }

    pub fn add_scale(&mut self, delta: Vec3) {
        self.scale += delta;
        self.touch();
    }

    /// Rotate so local -Z points at `target`.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize();
        let right = up.cross(-forward).normalize();
        let up = (-forward).cross(right);
        self.set_rotation(Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward)));
    }

    pub(crate) fn set_parent_link(&mut self, parent: Option<Entity>) {
        self.parent = parent;
        self.touch();
    }

    pub(crate) fn add_child_link(&mut self, child: Entity) {
        if let Err(pos) = self.children.binary_search(&child) {
            self.children.insert(pos, child);
        }
    }

    pub(crate) fn remove_child_link(&mut self, child: Entity) {
        self.children.retain(|c| *c != child);
    }

    /// Whether the local transform changed since the transform system last ran.
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub fn mesh_bounds_outdated(&self) -> bool {
        self.mesh_bounds_outdated
    }

    pub fn collider_bounds_outdated(&self) -> bool {
        self.collider_bounds_outdated
    }

    pub(crate) fn invalidate_mesh_bounds(&mut self) {
        self.mesh_bounds_outdated = true;
    }

    pub(crate) fn invalidate_collider_bounds(&mut self) {
        self.collider_bounds_outdated = true;
    }

    pub(crate) fn clear_updated(&mut self) {
        self.updated = false;
    }

    pub(crate) fn clear_mesh_bounds_outdated(&mut self) {
        self.mesh_bounds_outdated = false;
    }

    pub(crate) fn clear_collider_bounds_outdated(&mut self) {
        self.collider_bounds_outdated = false;
    }

    /// Local model matrix (scale, then rotation, then translation).
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// World matrix as of the last transform system run.
    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    pub(crate) fn set_world_matrix(&mut self, world: Mat4) {
        self.world = world;
    }

    pub fn world_position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    /// World-space local -Z.
    pub fn forward(&self) -> Vec3 {
        self.world.transform_vector3(-Vec3::Z).normalize_or_zero()
    }

    /// Build uniform data for shaders
    pub fn uniform_data(&self) -> TransformUniformData {
        let model = self.world;
        TransformUniformData {
            model,
            normal_matrix: model.inverse().transpose(),
        }
    }
}

/// Transform uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TransformUniformData {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_raise_flags() {
        let mut t = Transform::new();
        t.clear_updated();
        t.clear_mesh_bounds_outdated();
        t.clear_collider_bounds_outdated();
        assert!(!t.is_updated());

        t.add_position(Vec3::X);
        assert!(t.is_updated());
        assert!(t.mesh_bounds_outdated());
        assert!(t.collider_bounds_outdated());
        assert_eq!(t.position(), Vec3::X);
    }

    #[test]
    fn test_rotation_stays_unit() {
        let mut t = Transform::new();
        t.set_rotation(Quat::from_xyzw(0.0, 2.0, 0.0, 2.0));
        assert!((t.rotation().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_local_matrix_order() {
        let t = Transform::from_position_scale(Vec3::new(1.0, 0.0, 0.0), Vec3::splat(2.0));
        let p = t.local_matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_children_sorted_unique() {
        let mut t = Transform::new();
        t.add_child_link(Entity::from_raw(5));
        t.add_child_link(Entity::from_raw(2));
        t.add_child_link(Entity::from_raw(5));
        assert_eq!(t.children(), &[Entity::from_raw(2), Entity::from_raw(5)]);
        t.remove_child_link(Entity::from_raw(2));
        assert_eq!(t.children(), &[Entity::from_raw(5)]);
    }
}

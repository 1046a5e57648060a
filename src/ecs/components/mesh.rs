//! Mesh component and bounding volumes

use crate::resources::{MaterialId, MeshId};
use glam::{Mat4, Vec3};

/// Bounding sphere used for mesh culling and sorting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub centre: Vec3,
    pub radius: f32,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            centre: Vec3::ZERO,
            radius: 0.0,
        }
    }
}

impl BoundingSphere {
    pub fn new(centre: Vec3, radius: f32) -> Self {
        Self { centre, radius }
    }

    /// Smallest sphere around a point cloud's bounding box.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        let mut any = false;
        for p in points {
            min = min.min(p);
            max = max.max(p);
            any = true;
        }
        if !any {
            return Self::default();
        }
        let centre = (min + max) * 0.5;
        Self {
            centre,
            radius: (max - centre).length(),
        }
    }

    /// Apply `matrix`, growing the radius by the largest axis scale.
    pub fn transformed(&self, matrix: Mat4) -> Self {
        let max_scale = matrix
            .x_axis
            .truncate()
            .length()
            .max(matrix.y_axis.truncate().length())
            .max(matrix.z_axis.truncate().length());
        Self {
            centre: matrix.transform_point3(self.centre),
            radius: self.radius * max_scale,
        }
    }
}

/// Renderable geometry attached to an entity.
#[derive(Debug, Clone)]
pub struct MeshComponent {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub visible: bool,
    pub render_wireframe: bool,
    /// Mesh-space bounds, copied from the geometry when the component is built.
    local_bounds: BoundingSphere,
    world_bounds: BoundingSphere,
    bounds_outdated: bool,
}

impl MeshComponent {
    pub fn new(mesh: MeshId, material: MaterialId, local_bounds: BoundingSphere) -> Self {
        Self {
            mesh,
            material,
            visible: true,
            render_wireframe: false,
            local_bounds,
            world_bounds: local_bounds,
            bounds_outdated: true,
        }
    }

    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.render_wireframe = wireframe;
        self
    }

    pub fn local_bounds(&self) -> BoundingSphere {
        self.local_bounds
    }

    /// Swap the mesh-space bounds; world bounds are recomputed on the next
    /// transform system run.
    pub fn set_local_bounds(&mut self, bounds: BoundingSphere) {
        self.local_bounds = bounds;
        self.bounds_outdated = true;
    }

    /// Whether the world bounds lag behind a local bounds change.
    pub fn bounds_outdated(&self) -> bool {
        self.bounds_outdated
    }

    /// World-space bounds. Only fresh once the transform system has run for
    /// the owning transform's current state.
    pub fn world_bounds(&self) -> BoundingSphere {
        self.world_bounds
    }

    pub(crate) fn update_world_bounds(&mut self, world: Mat4) {
        self.world_bounds = self.local_bounds.transformed(world);
        self.bounds_outdated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_from_points() {
        let s = BoundingSphere::from_points([Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)]);
        assert_eq!(s.centre, Vec3::ZERO);
        assert!((s.radius - 1.0).abs() < 1e-6);
        assert_eq!(BoundingSphere::from_points([]), BoundingSphere::default());
    }

    #[test]
    fn test_sphere_transform_uses_max_scale() {
        let s = BoundingSphere::new(Vec3::ZERO, 1.0);
        let m = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 3.0, 2.0),
            glam::Quat::IDENTITY,
            Vec3::new(0.0, 5.0, 0.0),
        );
        let t = s.transformed(m);
        assert_eq!(t.centre, Vec3::new(0.0, 5.0, 0.0));
        assert!((t.radius - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_local_bounds_change_flags_outdated() {
        let mut mesh = MeshComponent::new(MeshId(0), MaterialId(0), BoundingSphere::new(Vec3::ZERO, 1.0));
        mesh.update_world_bounds(Mat4::IDENTITY);
        assert!(!mesh.bounds_outdated());

        mesh.set_local_bounds(BoundingSphere::new(Vec3::ZERO, 10.0));
        assert!(mesh.bounds_outdated());
        assert_eq!(mesh.world_bounds().radius, 1.0);
        mesh.update_world_bounds(Mat4::from_translation(Vec3::X));
        assert_eq!(mesh.world_bounds(), BoundingSphere::new(Vec3::X, 10.0));
    }
}

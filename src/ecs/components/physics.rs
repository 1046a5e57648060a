//! Physics and collider components

use glam::{Mat3, Mat4, Vec3};

/// Linear motion state of an entity.
#[derive(Debug, Clone)]
pub struct Physics {
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub mass: f32,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            mass: 1.0,
        }
    }
}

impl Physics {
    pub fn with_velocity(velocity: Vec3) -> Self {
        Self {
            velocity,
            ..Default::default()
        }
    }
}

/// Collider shape with its extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    None,
    /// Axis-aligned box (half extents); ignores rotation.
    Aabb(Vec3),
    /// Oriented box (half extents).
    Box(Vec3),
    Sphere(f32),
    /// Capsule along local +Y; `height` excludes the caps.
    Capsule { radius: f32, height: f32 },
}

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub centre: Vec3,
    pub extents: Vec3,
}

impl Aabb {
    pub fn min_max(&self) -> (Vec3, Vec3) {
        (self.centre - self.extents, self.centre + self.extents)
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        let d = (self.centre - other.centre).abs();
        let r = self.extents + other.extents;
        d.x <= r.x && d.y <= r.y && d.z <= r.z
    }
}

/// Collision volume of an entity.
#[derive(Debug, Clone)]
pub struct Collider {
    shape: ColliderShape,
    bounds: Aabb,
    bounds_outdated: bool,
}

impl Default for Collider {
    fn default() -> Self {
        Self::new(ColliderShape::None)
    }
}

impl Collider {
    pub fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            bounds: Aabb::default(),
            bounds_outdated: true,
        }
    }

    pub fn shape(&self) -> ColliderShape {
        self.shape
    }

    /// Change the shape; the cached AABB is rebuilt on the next transform
    /// system run.
    pub fn set_shape(&mut self, shape: ColliderShape) {
        self.shape = shape;
        self.bounds_outdated = true;
    }

    pub fn bounds_outdated(&self) -> bool {
        self.bounds_outdated
    }

    /// Cached world AABB, refreshed by the transform system.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub(crate) fn update_bounds(&mut self, world: Mat4) {
        self.bounds = Self::shape_bounds(self.shape, world);
        self.bounds_outdated = false;
    }

    fn shape_bounds(shape: ColliderShape, world: Mat4) -> Aabb {
        let centre = world.w_axis.truncate();
        let basis = Mat3::from_mat4(world);
        let axis_scale = Vec3::new(
            basis.x_axis.length(),
            basis.y_axis.length(),
            basis.z_axis.length(),
        );
        let max_scale = axis_scale.max_element();

        let extents = match shape {
            ColliderShape::None => Vec3::ZERO,
            ColliderShape::Aabb(half) => half * axis_scale,
            ColliderShape::Box(half) => {
                let abs = Mat3::from_cols(basis.x_axis.abs(), basis.y_axis.abs(), basis.z_axis.abs());
                abs * half
            }
            ColliderShape::Sphere(radius) => Vec3::splat(radius * max_scale),
            ColliderShape::Capsule { radius, height } => {
                let axis = basis * Vec3::new(0.0, height * 0.5, 0.0);
                axis.abs() + Vec3::splat(radius * max_scale)
            }
        };

        Aabb { centre, extents }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_rotated_box_grows_aabb() {
        let mut c = Collider::new(ColliderShape::Box(Vec3::new(1.0, 1.0, 1.0)));
        let world = Mat4::from_rotation_translation(
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            Vec3::new(2.0, 0.0, 0.0),
        );
        c.update_bounds(world);
        let b = c.bounds();
        assert_eq!(b.centre, Vec3::new(2.0, 0.0, 0.0));
        assert!((b.extents.x - std::f32::consts::SQRT_2).abs() < 1e-5);
        assert!((b.extents.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_set_shape_flags_outdated() {
        let mut c = Collider::new(ColliderShape::Sphere(1.0));
        c.update_bounds(Mat4::IDENTITY);
        assert!(!c.bounds_outdated());
        c.set_shape(ColliderShape::Sphere(4.0));
        assert!(c.bounds_outdated());
        assert_eq!(c.shape(), ColliderShape::Sphere(4.0));
    }

    #[test]
    fn test_capsule_bounds() {
        let mut c = Collider::new(ColliderShape::Capsule {
            radius: 0.5,
            height: 2.0,
        });
        c.update_bounds(Mat4::IDENTITY);
        assert!((c.bounds().extents - Vec3::new(0.5, 1.5, 0.5)).length() < 1e-5);
    }

    #[test]
    fn test_aabb_min_max_and_intersection() {
        let a = Aabb {
            centre: Vec3::ZERO,
            extents: Vec3::ONE,
        };
        let b = Aabb {
            centre: Vec3::new(1.5, 0.0, 0.0),
            extents: Vec3::splat(0.5),
        };
        assert_eq!(a.min_max(), (-Vec3::ONE, Vec3::ONE));
        assert!(a.intersects(&b));
        let far = Aabb {
            centre: Vec3::new(5.0, 0.0, 0.0),
            extents: Vec3::ONE,
        };
        assert!(!a.intersects(&far));
    }
}

//! Camera component

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3, Vec4};

/// Perspective camera driven by pitch and yaw.
///
/// The camera system combines pitch/yaw with the entity's world position and
/// caches the resulting matrices here. Yaw rotates around +Y, pitch around the
/// camera's local +X; both are radians.
#[derive(Debug, Clone)]
pub struct Camera {
    pub pitch: f32,
    pub yaw: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Editor cameras are skipped when picking the game camera.
    pub is_editor_camera: bool,
    aspect: f32,
    position: Vec3,
    view: Mat4,
    projection: Mat4,
    inv_projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            pitch: 0.0,
            yaw: 0.0,
            fov_y: 45f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            is_editor_camera: false,
            aspect: 16.0 / 9.0,
            position: Vec3::ZERO,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            inv_projection: Mat4::IDENTITY,
        };
        camera.update(Vec3::ZERO, camera.aspect);
        camera
    }
}

impl Camera {
    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self {
            pitch,
            yaw,
            ..Default::default()
        }
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn with_editor(mut self, editor: bool) -> Self {
        self.is_editor_camera = editor;
        self
    }

    pub fn with_fov(mut self, fov_y_degrees: f32) -> Self {
        self.fov_y = fov_y_degrees.to_radians();
        self
    }

    /// Orientation derived from yaw, then pitch.
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * -Vec3::Z
    }

    /// Refresh cached matrices from `position` and the viewport aspect.
    pub fn update(&mut self, position: Vec3, aspect: f32) {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            self.aspect
        };
        self.aspect = aspect;
        self.position = position;
        self.view = Mat4::from_rotation_translation(self.rotation(), position).inverse();
        self.projection = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        self.inv_projection = self.projection.inverse();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn inverse_projection_matrix(&self) -> Mat4 {
        self.inv_projection
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Build camera uniform data for shaders
    pub fn uniform_data(&self) -> CameraUniformData {
        let view_proj = self.projection * self.view;
        CameraUniformData {
            view: self.view,
            proj: self.projection,
            view_proj,
            inv_view: self.view.inverse(),
            inv_proj: self.inv_projection,
            position: self.position.extend(1.0),
            near_far: Vec4::new(self.near, self.far, 0.0, 0.0),
        }
    }
}

/// Camera uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniformData {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view: Mat4,
    pub inv_proj: Mat4,
    pub position: Vec4,
    pub near_far: Vec4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        assert!((camera.forward() - -Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_view_moves_world_opposite_to_camera() {
        let mut camera = Camera::default();
        camera.update(Vec3::new(0.0, 0.0, 5.0), 1.0);
        let p = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-4);
    }

    #[test]
    fn test_yaw_turns_left() {
        let camera = Camera::new(0.0, std::f32::consts::FRAC_PI_2);
        assert!((camera.forward() - -Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_invalid_aspect_keeps_previous() {
        let mut camera = Camera::default();
        camera.update(Vec3::ZERO, 2.0);
        let proj = camera.projection_matrix();
        camera.update(Vec3::ZERO, f32::NAN);
        assert_eq!(camera.projection_matrix(), proj);
    }
}

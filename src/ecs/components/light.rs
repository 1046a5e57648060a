//! Light components
//!
//! Position and direction come from the Transform on the same entity: lights
//! shine along the transform's local -Z.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Directional light component (like the sun)
#[derive(Debug, Clone)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    pub fn new(color: Vec3, intensity: f32) -> Self {
        Self { color, intensity }
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self, direction: Vec3) -> GpuLightData {
        GpuLightData {
            position_radius: Vec4::new(0.0, 0.0, 0.0, f32::MAX),
            color_intensity: self.color.extend(self.intensity),
            direction_type: direction.extend(LIGHT_TYPE_DIRECTIONAL),
            spot_params: Vec4::ZERO,
        }
    }
}

/// Point light component
#[derive(Debug, Clone)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
    /// Upper bound of the attenuated brightness.
    pub max_brightness: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 1.0,
            max_brightness: 2.0,
        }
    }
}

impl PointLight {
    pub fn new(color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            color,
            intensity,
            radius,
            ..Default::default()
        }
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self, position: Vec3) -> GpuLightData {
        GpuLightData {
            position_radius: position.extend(self.radius),
            color_intensity: self.color.extend(self.intensity),
            direction_type: Vec3::ZERO.extend(LIGHT_TYPE_POINT),
            spot_params: Vec4::new(self.max_brightness, 0.0, 0.0, 0.0),
        }
    }
}

/// Spot light component
#[derive(Debug, Clone)]
pub struct SpotLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Inner cone half-angle, radians.
    pub cut_off: f32,
    /// Outer cone half-angle, radians.
    pub outer_cut_off: f32,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            cut_off: 25f32.to_radians(),
            outer_cut_off: 35f32.to_radians(),
            constant: 1.0,
            linear: 0.045,
            quadratic: 0.0075,
        }
    }
}

impl SpotLight {
    pub fn new(color: Vec3, intensity: f32, cut_off: f32, outer_cut_off: f32) -> Self {
        Self {
            color,
            intensity,
            cut_off,
            outer_cut_off,
            ..Default::default()
        }
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self, position: Vec3, direction: Vec3) -> GpuLightData {
        GpuLightData {
            position_radius: position.extend(self.constant),
            color_intensity: self.color.extend(self.intensity),
            direction_type: direction.extend(LIGHT_TYPE_SPOT),
            spot_params: Vec4::new(
                self.cut_off.cos(),
                self.outer_cut_off.cos(),
                self.linear,
                self.quadratic,
            ),
        }
    }
}

pub const LIGHT_TYPE_POINT: f32 = 0.0;
pub const LIGHT_TYPE_SPOT: f32 = 1.0;
pub const LIGHT_TYPE_DIRECTIONAL: f32 = 2.0;

/// GPU-friendly light data structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuLightData {
    /// xyz = position, w = radius (point) or constant attenuation (spot)
    pub position_radius: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    /// xyz = direction, w = light type (0=point, 1=spot, 2=directional)
    pub direction_type: Vec4,
    /// point: x = max brightness; spot: x = cos(cut_off), y = cos(outer), z = linear, w = quadratic
    pub spot_params: Vec4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spot_defaults() {
        let spot = SpotLight::default();
        let gpu = spot.to_gpu_data(Vec3::ZERO, -Vec3::Y);
        assert!((gpu.spot_params.x - 25f32.to_radians().cos()).abs() < 1e-6);
        assert!(gpu.spot_params.x > gpu.spot_params.y);
        assert_eq!(gpu.spot_params.z, 0.045);
        assert_eq!(gpu.direction_type.w, LIGHT_TYPE_SPOT);
    }

    #[test]
    fn test_gpu_light_is_64_bytes() {
        assert_eq!(std::mem::size_of::<GpuLightData>(), 64);
    }
}

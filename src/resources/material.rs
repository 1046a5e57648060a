//! Surface materials for the deferred and forward passes

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Index of a material in the resource library
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub(crate) u32);

impl MaterialId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Blinn-Phong material
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub specular: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: Vec4::ONE,
            specular: 0.5,
        }
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, color: Vec4) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_specular(mut self, specular: f32) -> Self {
        self.specular = specular;
        self
    }

    /// Meshes with partial alpha are drawn in the forward pass, sorted by depth
    pub fn is_transparent(&self) -> bool {
        self.base_color.w < 1.0
    }

    pub fn uniform_data(&self) -> MaterialUniformData {
        MaterialUniformData {
            base_color: self.base_color,
            params: Vec4::new(self.specular, 0.0, 0.0, 0.0),
        }
    }

    pub fn plastic(color: Vec3) -> Self {
        Self::new("plastic")
            .with_base_color(color.extend(1.0))
            .with_specular(0.6)
    }

    pub fn matte(color: Vec3) -> Self {
        Self::new("matte")
            .with_base_color(color.extend(1.0))
            .with_specular(0.05)
    }

    pub fn glass() -> Self {
        Self::new("glass")
            .with_base_color(Vec4::new(0.8, 0.9, 1.0, 0.3))
            .with_specular(1.0)
    }
}

/// Material uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniformData {
    pub base_color: Vec4,
    pub params: Vec4, // x=specular, yzw=padding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparency_follows_alpha() {
        assert!(!Material::plastic(Vec3::ONE).is_transparent());
        assert!(Material::glass().is_transparent());
        assert_eq!(std::mem::size_of::<MaterialUniformData>(), 32);
    }
}

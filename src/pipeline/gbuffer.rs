//! G-buffer: the multi-attachment target of the geometry pass
//!
//! - Location 0: world position (RGBA16F, w = coverage)
//! - Location 1: world normal (RGBA16F)
//! - Location 2: albedo + specular strength (RGBA8)
//! - Depth32Float, copyable so forward extras can depth-test against it

use crate::backend::traits::*;
use crate::backend::types::*;

pub const GBUFFER_FORMATS: [TextureFormat; 3] = [
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba8Unorm,
];

const GBUFFER_LABELS: [&str; 3] = ["gbuffer_position", "gbuffer_normal", "gbuffer_albedo_spec"];

#[derive(Debug, Clone, Copy)]
pub struct GBuffer {
    color: [GpuTexture; 3],
    depth: GpuTexture,
    width: u32,
    height: u32,
}

impl GBuffer {
    /// Create all attachments; on failure nothing is left allocated
    pub fn create(backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> BackendResult<Self> {
        let depth_role = TextureRole::Depth { sampled: false };
        let specs = [
            (GBUFFER_LABELS[0], GBUFFER_FORMATS[0], TextureRole::Color),
            (GBUFFER_LABELS[1], GBUFFER_FORMATS[1], TextureRole::Color),
            (GBUFFER_LABELS[2], GBUFFER_FORMATS[2], TextureRole::Color),
            ("gbuffer_depth", DEPTH_FORMAT, depth_role),
        ];

        let mut created: Vec<GpuTexture> = Vec::with_capacity(specs.len());
        for (label, format, role) in specs {
            match backend.create_texture(&TextureDescriptor::new(label, width, height, format, role)) {
                Ok(texture) => created.push(texture),
                Err(e) => {
                    for texture in created {
                        backend.destroy_texture(texture);
                    }
                    return Err(e);
                }
            }
        }

        log::debug!("Created G-buffer {}x{}", width, height);
        Ok(Self {
            color: [created[0], created[1], created[2]],
            depth: created[3],
            width,
            height,
        })
    }

    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        for texture in self.color {
            backend.destroy_texture(texture);
        }
        backend.destroy_texture(self.depth);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn color_views(&self) -> [TextureViewHandle; 3] {
        self.color.map(|a| a.view)
    }

    pub fn depth_texture(&self) -> TextureHandle {
        self.depth.texture
    }

    /// Clears all attachments; uncovered pixels keep position.w = 0
    pub fn pass_descriptor(&self) -> RenderPassDescriptor {
        self.color
            .iter()
            .fold(RenderPassDescriptor::new("G-Buffer Pass"), |desc, texture| {
                desc.with_color(texture.view, LoadOp::Clear([0.0; 4]))
            })
            .with_depth(self.depth.view, LoadOp::Clear(1.0))
    }
}

//! Offscreen colour + depth render targets

use crate::backend::traits::*;
use crate::backend::types::*;

/// One colour texture plus a depth texture of the same size
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    pub color: GpuTexture,
    pub depth: GpuTexture,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Whether the depth texture can be bound for sampling
    pub depth_sampled: bool,
}

impl RenderTarget {
    /// Without `depth_sampling` the depth texture is only attachable and copyable
    pub fn create(
        backend: &mut dyn GraphicsBackend,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        depth_sampling: bool,
    ) -> BackendResult<Self> {
        let color = backend.create_texture(&TextureDescriptor::new(
            format!("{label} color"),
            width,
            height,
            format,
            TextureRole::Color,
        ))?;
        let depth = match backend.create_texture(&TextureDescriptor::new(
            format!("{label} depth"),
            width,
            height,
            DEPTH_FORMAT,
            TextureRole::Depth {
                sampled: depth_sampling,
            },
        )) {
            Ok(depth) => depth,
            Err(e) => {
                backend.destroy_texture(color);
                return Err(e);
            }
        };

        Ok(Self {
            color,
            depth,
            width,
            height,
            format,
            depth_sampled: depth_sampling,
        })
    }

    pub fn destroy(self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_texture(self.color);
        backend.destroy_texture(self.depth);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Clear colour and depth in one empty pass
    pub fn clear(&self, backend: &mut dyn GraphicsBackend, color: [f32; 4]) {
        backend.begin_render_pass(
            &RenderPassDescriptor::color("Clear Target", self.color.view, LoadOp::Clear(color))
                .with_depth(self.depth.view, LoadOp::Clear(1.0)),
        );
        backend.end_render_pass();
    }
}

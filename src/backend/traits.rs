//! The backend trait and the handles it hands out
//!
//! Every pass in the engine talks to the GPU through [`GraphicsBackend`],
//! so the same frame code runs on wgpu and on the recording backend. The
//! surface is what the deferred pipeline and the postprocess chains use:
//! textures with their views, samplers, bind groups, pipelines, render
//! passes and texture copies, including copies into the display.

use crate::backend::types::*;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Kind of GPU object a creation error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Sampler,
    BindGroup,
    Pipeline,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::Sampler => "sampler",
            Self::BindGroup => "bind group",
            Self::Pipeline => "pipeline",
        })
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("No usable GPU device: {0}")]
    NoDevice(String),
    #[error("Display surface error: {0}")]
    Surface(String),
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Failed to create {kind} '{label}': {reason}")]
    Create {
        kind: ResourceKind,
        label: String,
        reason: String,
    },
}

impl BackendError {
    pub fn create(kind: ResourceKind, label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Create {
            kind,
            label: label.into(),
            reason: reason.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

macro_rules! handles {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub(crate) u64);
        )*
    };
}

handles!(
    BufferHandle,
    TextureHandle,
    TextureViewHandle,
    SamplerHandle,
    BindGroupLayoutHandle,
    BindGroupHandle,
    RenderPipelineHandle,
);

/// A texture with its default view. Created and destroyed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuTexture {
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
}

/// Slot in a bind group layout. Uniforms are visible to both stages,
/// everything else to the fragment stage only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Uniform,
    /// Read-only storage buffer
    Storage,
    Texture { filterable: bool },
    /// Depth texture sampled as a float
    Depth,
    /// Linear-filtering sampler
    Sampler,
}

/// Resource bound at one slot of a bind group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindResource {
    Buffer(BufferHandle),
    BufferSlice {
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    },
    Texture(TextureViewHandle),
    Sampler(SamplerHandle),
}

/// Render pipeline over a single WGSL module
///
/// The module provides `vs_main` and `fs_main`. Without a vertex layout
/// the vertex stage generates its own positions (fullscreen triangles, the
/// skybox). There is one colour target per entry of `targets`.
#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    pub label: String,
    pub wgsl: String,
    pub vertex_layout: Option<VertexLayout>,
    pub bind_layouts: Vec<BindGroupLayoutHandle>,
    pub topology: Topology,
    pub depth: Option<DepthTest>,
    pub targets: Vec<(TextureFormat, Blend)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<T> {
    Clear(T),
    Load,
}

/// Attachments of a render pass; results are always stored
#[derive(Debug, Clone)]
pub struct RenderPassDescriptor {
    pub label: String,
    pub colors: Vec<(TextureViewHandle, LoadOp<[f32; 4]>)>,
    pub depth: Option<(TextureViewHandle, LoadOp<f32>)>,
}

impl RenderPassDescriptor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            colors: Vec::new(),
            depth: None,
        }
    }

    /// Single colour attachment, no depth
    pub fn color(label: impl Into<String>, view: TextureViewHandle, load: LoadOp<[f32; 4]>) -> Self {
        Self::new(label).with_color(view, load)
    }

    pub fn with_color(mut self, view: TextureViewHandle, load: LoadOp<[f32; 4]>) -> Self {
        self.colors.push((view, load));
        self
    }

    pub fn with_depth(mut self, view: TextureViewHandle, load: LoadOp<f32>) -> Self {
        self.depth = Some((view, load));
        self
    }
}

/// Returned by `begin_frame`; the display is only valid until `end_frame`
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub display: GpuTexture,
    pub width: u32,
    pub height: u32,
}

pub trait GraphicsBackend {
    /// Resize the display; zero sizes are ignored
    fn resize(&mut self, width: u32, height: u32);

    /// Actual display size, possibly clamped by device limits
    fn display_size(&self) -> (u32, u32);

    fn display_format(&self) -> TextureFormat;

    /// Whether the display can be the destination of `copy_texture`
    fn supports_display_copy(&self) -> bool {
        true
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext>;

    /// Submit the frame's commands and present the display
    fn end_frame(&mut self) -> BackendResult<()>;

    // Resources

    /// Zero-filled buffer of `size` bytes
    fn create_buffer(&mut self, label: &str, kind: BufferKind, size: u64) -> BackendResult<BufferHandle>;

    fn create_buffer_init(&mut self, label: &str, kind: BufferKind, contents: &[u8]) -> BackendResult<BufferHandle>;

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<GpuTexture>;

    /// Upload tightly packed RGBA8 pixels
    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32);

    fn create_sampler(&mut self, label: &str, wrap: Wrap) -> BackendResult<SamplerHandle>;

    fn create_bind_group_layout(&mut self, entries: &[(u32, Binding)]) -> BackendResult<BindGroupLayoutHandle>;

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindResource)],
    ) -> BackendResult<BindGroupHandle>;

    fn create_render_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<RenderPipelineHandle>;

    // Commands

    /// Copy the top-left `width` x `height` region of `src` into `dst`.
    /// Must be called outside a render pass.
    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle, width: u32, height: u32);

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor);

    fn end_render_pass(&mut self);

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle);

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle);

    fn set_vertex_buffer(&mut self, buffer: BufferHandle);

    fn set_index_buffer(&mut self, buffer: BufferHandle);

    fn draw(&mut self, vertices: Range<u32>);

    fn draw_indexed(&mut self, indices: Range<u32>);

    // Cleanup

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Destroy a texture together with its view
    fn destroy_texture(&mut self, texture: GpuTexture);

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle);
}

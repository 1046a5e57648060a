//! Scene Engine - runtime core of a real-time 3D scene engine
//!
//! # Features
//! - Sorted component stores correlated by merge joins instead of lookups
//! - Deferred geometry + lighting pipeline with forward extras
//! - Postprocess chains over ping-pong buffers, resumable step by step
//! - A [`backend::GraphicsBackend`] trait with a wgpu implementation and a
//!   deterministic recording backend for GPU-free tests

pub mod backend;
pub mod diagnostics;
pub mod ecs;
pub mod engine;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod systems;

pub use backend::{GraphicsBackend, RecordingBackend, WgpuBackend};
pub use engine::Engine;
pub use pipeline::{ChainTarget, ForwardExtras, PostprocessConfig, PostprocessStep, StepRecord};
pub use renderer::{FrameStats, Renderer};
pub use resources::{ResourceCache, ResourceLibrary};

use glam::Vec3;

/// Renderer options fixed at creation time (extras can be toggled later)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererConfig {
    /// Create postprocess depth textures that programs can sample
    pub depth_sampling: bool,
    /// Whether the main chain's last step writes to the display
    pub output_to_default: bool,
    /// Forward extras drawn after lighting
    pub extras: ForwardExtras,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            depth_sampling: true,
            output_to_default: true,
            extras: ForwardExtras::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_depth_sampling(mut self, depth_sampling: bool) -> Self {
        self.depth_sampling = depth_sampling;
        self
    }

    pub fn with_output_to_default(mut self, output_to_default: bool) -> Self {
        self.output_to_default = output_to_default;
        self
    }

    pub fn with_extras(mut self, extras: ForwardExtras) -> Self {
        self.extras = extras;
        self
    }
}

/// Configuration for initializing the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    /// Colour the lit image starts from
    pub clear_color: [f32; 4],
    /// Ambient light added by the directional lighting pass
    pub ambient: Vec3,
    pub renderer: RendererConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Scene Engine".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            clear_color: [0.1, 0.1, 0.15, 1.0],
            ambient: Vec3::splat(0.05),
            renderer: RendererConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    pub fn with_ambient(mut self, ambient: Vec3) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }
}

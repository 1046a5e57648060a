//! Main engine orchestrator
//!
//! Owns the entity manager, the resource library, the renderer and the
//! backend. A frame is:
//! 1. systems (physics, transforms, cameras)
//! 2. render and present
//! 3. frame boundary: queued transform deltas, then removal of marked entities

use crate::backend::traits::*;
use crate::ecs::{EntityManager, TransformDelta, TransformSnapshot};
use crate::pipeline::PostprocessConfig;
use crate::renderer::{FrameStats, Renderer};
use crate::resources::{Material, MaterialId, Mesh, MeshId, ResourceLibrary, ShaderKind};
use crate::systems;
use crate::EngineConfig;

pub struct Engine<B: GraphicsBackend> {
    backend: B,
    entities: EntityManager,
    resources: ResourceLibrary,
    renderer: Renderer,
    pending_deltas: Vec<TransformDelta>,
    config: EngineConfig,
    elapsed: f32,
    frame_index: u64,
}

impl<B: GraphicsBackend> Engine<B> {
    /// Create an engine rendering through `backend`, with the built-in programs registered
    pub fn new(backend: B, config: EngineConfig) -> Self {
        let renderer = Renderer::new(
            config.renderer,
            backend.display_format(),
            config.ambient,
            config.clear_color,
        );
        log::info!("Engine '{}' created", config.title);
        Self {
            backend,
            entities: EntityManager::new(),
            resources: ResourceLibrary::with_builtin_shaders(),
            renderer,
            pending_deltas: Vec::new(),
            config,
            elapsed: 0.0,
            frame_index: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityManager {
        &mut self.entities
    }

    pub fn resources(&self) -> &ResourceLibrary {
        &self.resources
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Upload a mesh under `name`
    pub fn add_mesh(&mut self, name: &str, mesh: &Mesh) -> BackendResult<MeshId> {
        self.resources.add_mesh(&mut self.backend, name, mesh)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.resources.add_material(material)
    }

    /// Upload RGBA8 pixels under `name`
    pub fn add_texture(&mut self, name: &str, width: u32, height: u32, rgba: &[u8]) -> BackendResult<()> {
        self.resources
            .add_texture(&mut self.backend, name, width, height, rgba)
            .map(|_| ())
    }

    /// Register a program; returns whether it linked
    pub fn register_shader(&mut self, name: &str, kind: ShaderKind, body: &str) -> bool {
        self.resources.register_shader(name, kind, body)
    }

    pub fn configure_postprocess(&mut self, config: &PostprocessConfig) {
        self.renderer.configure_postprocess(config);
    }

    /// Transform state handed to external scripts
    pub fn snapshot_transforms(&self) -> Vec<TransformSnapshot> {
        self.entities.snapshot_transforms()
    }

    /// Queue script results; they are applied at the end of the frame
    pub fn queue_transform_deltas(&mut self, deltas: impl IntoIterator<Item = TransformDelta>) {
        self.pending_deltas.extend(deltas);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.backend.resize(width, height);
        let (width, height) = self.backend.display_size();
        log::debug!("Resized to {}x{}", width, height);
    }

    /// Run the systems for a step of `dt` seconds
    pub fn update(&mut self, dt: f32) {
        self.elapsed += dt;
        let (width, height) = self.backend.display_size();
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        systems::run_frame(&mut self.entities, dt, aspect);
    }

    /// Render and present one frame
    pub fn render(&mut self) -> BackendResult<FrameStats> {
        let frame = self.backend.begin_frame()?;
        self.renderer.set_time(self.elapsed);
        let stats = self
            .renderer
            .render(&mut self.backend, &self.resources, self.entities.stores(), &frame);
        self.backend.end_frame()?;
        Ok(stats)
    }

    /// Apply queued deltas and remove marked entities. Runs between frames only.
    pub fn end_frame(&mut self) {
        if !self.pending_deltas.is_empty() {
            let deltas = std::mem::take(&mut self.pending_deltas);
            let applied = self.entities.apply_transform_deltas(&deltas);
            log::trace!("Applied {} of {} transform deltas", applied, deltas.len());
        }
        self.entities.remove_entities_marked();
        self.frame_index += 1;
    }

    /// One full frame: update, render, frame boundary
    pub fn frame(&mut self, dt: f32) -> BackendResult<FrameStats> {
        self.update(dt);
        let stats = self.render();
        // The boundary runs even when presenting failed
        self.end_frame();
        stats
    }

    /// Release every GPU resource and hand the backend back
    pub fn shutdown(mut self) -> B {
        self.renderer.destroy(&mut self.backend);
        self.resources.destroy(&mut self.backend);
        self.backend
    }
}

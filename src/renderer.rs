//! Frame renderer: deferred scene, auxiliary chains, main chain to the display
//!
//! One frame runs:
//! 1. the deferred pipeline into the main chain's input buffer
//! 2. for each auxiliary chain (outline, bloom) with steps: copy the scene
//!    into its input, run it offscreen, composite its output into the main input
//! 3. the main chain, ending at the display
//!
//! Step 3 can be spread over several calls with [`Renderer::postprocess_step`].

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::diagnostics::WarnOnce;
use crate::ecs::{Camera, Stores};
use crate::pipeline::{
    BlendMode, ChainTarget, DeferredPipeline, ForwardExtras, LightKind, PostprocessChain,
    PostprocessConfig, PostprocessStep,
};
use crate::resources::ResourceCache;
use crate::systems::camera::active_camera;
use crate::RendererConfig;
use glam::Vec3;

/// Counters of the last rendered frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub vertices_drawn: u64,
    pub postprocess_steps: usize,
    pub scene_rendered: bool,
}

pub struct Renderer {
    config: RendererConfig,
    deferred: DeferredPipeline,
    main: PostprocessChain,
    bloom: PostprocessChain,
    outline: PostprocessChain,
    fallback_camera: Camera,
    warnings: WarnOnce,
    stats: FrameStats,
}

impl Renderer {
    /// `format` is the display format; every chain buffer uses it.
    pub fn new(config: RendererConfig, format: TextureFormat, ambient: Vec3, clear_color: [f32; 4]) -> Self {
        log::info!(
            "Creating renderer (format {:?}, depth sampling {})",
            format,
            config.depth_sampling
        );
        Self {
            deferred: DeferredPipeline::new(config.extras, ambient, clear_color),
            main: PostprocessChain::new("main", format, config.depth_sampling, config.output_to_default),
            bloom: PostprocessChain::new("bloom", format, config.depth_sampling, false),
            outline: PostprocessChain::new("outline", format, config.depth_sampling, false),
            fallback_camera: Camera::default(),
            warnings: WarnOnce::new(),
            stats: FrameStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn deferred(&self) -> &DeferredPipeline {
        &self.deferred
    }

    pub fn chain(&self, target: ChainTarget) -> &PostprocessChain {
        match target {
            ChainTarget::Main => &self.main,
            ChainTarget::Bloom => &self.bloom,
            ChainTarget::Outline => &self.outline,
        }
    }

    pub fn chain_mut(&mut self, target: ChainTarget) -> &mut PostprocessChain {
        match target {
            ChainTarget::Main => &mut self.main,
            ChainTarget::Bloom => &mut self.bloom,
            ChainTarget::Outline => &mut self.outline,
        }
    }

    /// Replace the steps of all three chains
    pub fn configure_postprocess(&mut self, config: &PostprocessConfig) {
        for target in [ChainTarget::Main, ChainTarget::Bloom, ChainTarget::Outline] {
            self.configure_chain(target, config.steps(target).to_vec());
        }
    }

    pub fn configure_chain(&mut self, target: ChainTarget, steps: Vec<PostprocessStep>) {
        self.chain_mut(target).configure(steps);
    }

    pub fn set_extras(&mut self, extras: ForwardExtras) {
        self.config.extras = extras;
        self.deferred.set_extras(extras);
    }

    pub fn set_ambient(&mut self, ambient: Vec3) {
        self.deferred.set_ambient(ambient);
    }

    pub fn set_light_order(&mut self, order: [LightKind; 3]) {
        self.deferred.set_light_order(order);
    }

    /// Seconds since start, seen by postprocess programs
    pub fn set_time(&mut self, seconds: f32) {
        for chain in [&mut self.main, &mut self.bloom, &mut self.outline] {
            chain.set_time(seconds);
        }
    }

    /// Render the whole frame into `frame`
    pub fn render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        stores: &Stores,
        frame: &FrameContext,
    ) -> FrameStats {
        self.prepare(backend, cache, stores, frame);
        let mut index = 0;
        loop {
            let next = self.postprocess_step(backend, cache, frame, index);
            if next == index {
                break;
            }
            index = next;
        }
        self.stats
    }

    /// Everything before the main chain: scene, auxiliary chains, composites.
    ///
    /// Returns false when the main chain has no buffers this frame.
    pub fn prepare(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        stores: &Stores,
        frame: &FrameContext,
    ) -> bool {
        self.stats = FrameStats::default();
        if !self.main.ensure_size(backend, frame.width, frame.height) {
            return false;
        }
        let Some(target) = self.main.input().copied() else {
            return false;
        };

        let camera = match active_camera(stores) {
            Some((_, camera)) => camera,
            None => {
                self.warnings.warn("no-camera", || {
                    "No camera with a transform, rendering from the origin".to_string()
                });
                self.fallback_camera
                    .update(Vec3::ZERO, frame.width as f32 / frame.height as f32);
                &self.fallback_camera
            }
        };

        self.stats.scene_rendered = self
            .deferred
            .geometry_and_lighting_pass(backend, cache, stores, camera, &target);
        if !self.stats.scene_rendered {
            // Keep the chain input defined when the scene could not be drawn
            self.main.clear(backend);
        }
        self.stats.vertices_drawn = self.deferred.vertices_drawn();

        for (chain, mode) in [
            (&mut self.outline, BlendMode::Alpha),
            (&mut self.bloom, BlendMode::Add),
        ] {
            if chain.step_count() == 0 || !chain.ensure_size(backend, frame.width, frame.height) {
                continue;
            }
            let Some(input) = chain.input().copied() else {
                continue;
            };
            backend.copy_texture(target.color.texture, input.color.texture, frame.width, frame.height);
            backend.copy_texture(target.depth.texture, input.depth.texture, frame.width, frame.height);
            chain.render(backend, cache, frame);
            self.stats.postprocess_steps += chain.step_count();
            self.main.composite(backend, cache, chain, mode);
        }
        true
    }

    /// Execute main chain step `index`; returns the next index, or `index`
    /// once the chain is done.
    pub fn postprocess_step(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        frame: &FrameContext,
        index: usize,
    ) -> usize {
        let next = self.main.render_step(backend, cache, frame, index);
        if next != index {
            self.stats.postprocess_steps += 1;
        }
        next
    }

    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        self.deferred.destroy(backend);
        for chain in [&mut self.main, &mut self.bloom, &mut self.outline] {
            chain.destroy(backend);
        }
    }
}

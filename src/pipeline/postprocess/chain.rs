//! Postprocess chain: ordered fullscreen steps over two ping-pong buffers
//!
//! `render_step(i)` executes step `i` and returns `i + 1`; once the chain is
//! finished it returns `i` unchanged. Calling it from 0 until the index stops
//! moving issues exactly the commands of one `render()`.
//!
//! Per step:
//! 1. copy depth from the source buffer to the destination buffer (skipped
//!    when the destination is the display, which has no depth)
//! 2. draw the step's program into the destination, reading the source colour
//!    (and depth when the program samples it)
//! 3. toggle the ping-pong state
//!
//! A step whose program is missing or unlinked runs `passthrough` instead;
//! without `passthrough` the destination is just cleared.

use super::pingpong::PingPong;
use super::step::{BlendMode, ParamValue, PostprocessStep};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::diagnostics::WarnOnce;
use crate::pipeline::shaders::names;
use crate::pipeline::target::RenderTarget;
use crate::pipeline::{fullscreen_pipeline, uniform_buffer, PipelineCache};
use crate::resources::{ResourceCache, ShaderProgram, EXTRA_TEXTURE_BINDING, PARAMS_BINDING};
use bytemuck::{Pod, Zeroable};
use std::collections::{BTreeMap, HashMap};

// Bind group slot of the zero-step passthrough to the display
const DISPLAY_SLOT: usize = usize::MAX;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FrameUniforms {
    resolution: [f32; 2],
    time: f32,
    _pad: f32,
}

/// Layouts, sampler and frame uniforms shared by every step
struct SharedResources {
    standard_layout: BindGroupLayoutHandle,
    depth_layout: BindGroupLayoutHandle,
    blend_layout: BindGroupLayoutHandle,
    sampler: SamplerHandle,
    frame_uniforms: BufferHandle,
}

impl SharedResources {
    fn create(backend: &mut dyn GraphicsBackend, label: &str) -> BackendResult<Self> {
        let colour = Binding::Texture { filterable: true };
        let base = [
            (0, colour),
            (1, Binding::Sampler),
            (2, Binding::Uniform),
            (PARAMS_BINDING, Binding::Uniform),
        ];
        let with_extra = |extra: Binding| {
            let mut entries = base.to_vec();
            entries.push((EXTRA_TEXTURE_BINDING, extra));
            entries
        };
        let standard_layout = backend.create_bind_group_layout(&base)?;
        let depth_layout = backend.create_bind_group_layout(&with_extra(Binding::Depth))?;
        let blend_layout = backend.create_bind_group_layout(&with_extra(colour))?;

        let sampler = backend.create_sampler(&format!("{label} sampler"), Wrap::Clamp)?;
        let frame_uniforms = uniform_buffer(
            backend,
            &format!("{label} frame uniforms"),
            std::mem::size_of::<FrameUniforms>() as u64,
        )?;

        Ok(Self {
            standard_layout,
            depth_layout,
            blend_layout,
            sampler,
            frame_uniforms,
        })
    }

    fn destroy(self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_buffer(self.frame_uniforms);
    }
}

pub struct PostprocessChain {
    label: String,
    steps: Vec<PostprocessStep>,
    format: TextureFormat,
    depth_sampling: bool,
    output_to_default: bool,
    buffers: Option<[RenderTarget; 2]>,
    size: (u32, u32),
    // Bumped whenever the buffers are rebuilt
    generation: u64,
    pingpong: PingPong,
    shared: Option<SharedResources>,
    // Parameter buffer per step slot, tagged with the program revision it was packed for
    params: HashMap<usize, (BufferHandle, u64)>,
    // Bind group per (step slot, source buffer), tagged with the program revision
    groups: HashMap<(usize, usize), (u64, BindGroupHandle)>,
    blend_params: HashMap<BlendMode, BufferHandle>,
    // Blend bind group per (mode, overlay chain label)
    blend_groups: HashMap<(BlendMode, String), BlendGroup>,
    retired_groups: Vec<BindGroupHandle>,
    retired_buffers: Vec<BufferHandle>,
    pipelines: PipelineCache,
    time: f32,
    warnings: WarnOnce,
}

impl PostprocessChain {
    /// `format` is the colour format of both buffers; use the display format
    /// so the zero-step identity path can copy.
    pub fn new(label: &str, format: TextureFormat, depth_sampling: bool, output_to_default: bool) -> Self {
        Self {
            label: label.to_string(),
            steps: Vec::new(),
            format,
            depth_sampling,
            output_to_default,
            buffers: None,
            size: (0, 0),
            generation: 0,
            pingpong: PingPong::new(),
            shared: None,
            params: HashMap::new(),
            groups: HashMap::new(),
            blend_params: HashMap::new(),
            blend_groups: HashMap::new(),
            retired_groups: Vec::new(),
            retired_buffers: Vec::new(),
            pipelines: PipelineCache::default(),
            time: 0.0,
            warnings: WarnOnce::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Replace the configured steps. No GPU work happens here.
    pub fn configure(&mut self, steps: Vec<PostprocessStep>) {
        log::debug!(
            "Postprocess chain '{}' configured with {} steps",
            self.label,
            steps.len()
        );
        self.steps = steps;
        self.retire_step_resources();
    }

    pub fn steps(&self) -> &[PostprocessStep] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn output_to_default(&self) -> bool {
        self.output_to_default
    }

    pub fn set_output_to_default(&mut self, output_to_default: bool) {
        self.output_to_default = output_to_default;
    }

    pub fn depth_sampling(&self) -> bool {
        self.depth_sampling
    }

    /// Seconds passed to every program as `frame.time`
    pub fn set_time(&mut self, seconds: f32) {
        self.time = seconds;
    }

    /// Counts buffer rebuilds; views of an older generation are gone.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn ping_pong(&self) -> PingPong {
        self.pingpong
    }

    pub fn warnings(&self) -> &WarnOnce {
        &self.warnings
    }

    /// Buffer the scene is rendered into
    pub fn input(&self) -> Option<&RenderTarget> {
        self.buffers.as_ref().map(|b| &b[0])
    }

    /// Buffer holding the result of the last executed step
    pub fn output(&self) -> Option<&RenderTarget> {
        self.buffers.as_ref().map(|b| &b[self.pingpong.active()])
    }

    /// (Re)create both buffers when the viewport size changed.
    ///
    /// Returns false when the buffers could not be created; the chain then
    /// has no buffers until a later call succeeds.
    pub fn ensure_size(&mut self, backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> bool {
        self.flush_retired(backend);
        if width == 0 || height == 0 {
            return false;
        }
        if self.buffers.is_some() && self.size == (width, height) {
            return true;
        }

        self.release_buffers(backend);
        let first = RenderTarget::create(
            backend,
            &format!("{} ping-pong 0", self.label),
            width,
            height,
            self.format,
            self.depth_sampling,
        );
        let second = RenderTarget::create(
            backend,
            &format!("{} ping-pong 1", self.label),
            width,
            height,
            self.format,
            self.depth_sampling,
        );
        match (first, second) {
            (Ok(a), Ok(b)) => {
                self.buffers = Some([a, b]);
                self.size = (width, height);
                self.generation += 1;
                self.pingpong.reset();
                log::debug!(
                    "Postprocess chain '{}' buffers created at {}x{}",
                    self.label,
                    width,
                    height
                );
                true
            }
            (first, second) => {
                let mut reason = String::new();
                for result in [first, second] {
                    match result {
                        Ok(target) => target.destroy(backend),
                        Err(e) => reason = e.to_string(),
                    }
                }
                let label = self.label.clone();
                self.warnings.error(&format!("buffers:{width}x{height}"), || {
                    format!("Postprocess chain '{label}' could not create {width}x{height} buffers: {reason}")
                });
                false
            }
        }
    }

    /// Clear the input buffer (colour and depth) and restart from it
    pub fn clear(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(input) = self.input() {
            input.clear(backend, CLEAR_COLOR);
        }
        self.pingpong.reset();
    }

    /// Execute every step in order
    pub fn render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        frame: &FrameContext,
    ) -> bool {
        let mut index = 0;
        loop {
            let next = self.render_step(backend, cache, frame, index);
            if next == index {
                break;
            }
            index = next;
        }
        self.buffers.is_some()
    }

    /// Execute step `index` and return the index of the next one.
    ///
    /// Step 0 also checks the viewport size and restarts from the input
    /// buffer. With no steps and `output_to_default` set, step 0 copies the
    /// input to the display.
    pub fn render_step(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        frame: &FrameContext,
        index: usize,
    ) -> usize {
        if index == 0 {
            if !self.ensure_size(backend, frame.width, frame.height) {
                return index;
            }
            self.pingpong.reset();
            if let Err(e) = self.write_frame_uniforms(backend) {
                self.report_failure(&e);
                return index;
            }
        }
        let Some(buffers) = self.buffers else {
            return index;
        };

        if self.steps.is_empty() {
            if index == 0 && self.output_to_default {
                self.present_input(backend, cache, frame, &buffers);
            }
            return index;
        }
        if index >= self.steps.len() {
            return index;
        }

        let source = self.pingpong.active();
        let dest = self.pingpong.next();
        let to_display = index + 1 == self.steps.len() && self.output_to_default;
        let dest_view = if to_display {
            frame.display.view
        } else {
            // Keep the depth of the scene available to later steps
            let (width, height) = self.size;
            backend.copy_texture(
                buffers[source].depth.texture,
                buffers[dest].depth.texture,
                width,
                height,
            );
            buffers[dest].color.view
        };

        let overrides = self.steps[index].params.clone();
        match self.resolve_program(cache, index) {
            Some(program) => {
                if let Err(e) =
                    self.draw_step(backend, index, program, &overrides, source, &buffers, dest_view)
                {
                    self.report_failure(&e);
                    clear_view(backend, dest_view);
                }
            }
            None => clear_view(backend, dest_view),
        }

        self.pingpong.toggle();
        index + 1
    }

    /// Blend `other`'s output into this chain's input
    pub fn composite(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        other: &PostprocessChain,
        mode: BlendMode,
    ) -> bool {
        let (Some(buffers), Some(overlay)) = (self.buffers, other.output()) else {
            return false;
        };
        if overlay.size() != self.size {
            let (label, other_label) = (self.label.clone(), other.label.clone());
            self.warnings.warn(&format!("composite-size:{other_label}"), || {
                format!("Cannot composite '{other_label}' into '{label}': buffer sizes differ")
            });
            return false;
        }
        let Some(program) = self.linked(cache, names::BLEND) else {
            return false;
        };

        let overlay = OverlaySource {
            label: &other.label,
            generation: other.generation,
            view: overlay.color.view,
        };
        match self.draw_blend(backend, program, mode, &buffers, overlay) {
            Ok(()) => {
                let (width, height) = self.size;
                backend.copy_texture(
                    buffers[1].color.texture,
                    buffers[0].color.texture,
                    width,
                    height,
                );
                true
            }
            Err(e) => {
                self.report_failure(&e);
                false
            }
        }
    }

    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        self.retire_step_resources();
        self.release_buffers(backend);
        for (_, buffer) in self.blend_params.drain() {
            backend.destroy_buffer(buffer);
        }
        self.flush_retired(backend);
        if let Some(shared) = self.shared.take() {
            shared.destroy(backend);
        }
        self.pipelines.clear();
    }

    fn shared(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<&SharedResources> {
        let shared = match self.shared.take() {
            Some(shared) => shared,
            None => SharedResources::create(backend, &self.label)?,
        };
        Ok(self.shared.insert(shared))
    }

    fn write_frame_uniforms(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        let uniforms = FrameUniforms {
            resolution: [self.size.0 as f32, self.size.1 as f32],
            time: self.time,
            _pad: 0.0,
        };
        let buffer = self.shared(backend)?.frame_uniforms;
        backend.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
        Ok(())
    }

    fn linked<'a>(&mut self, cache: &'a dyn ResourceCache, name: &str) -> Option<&'a ShaderProgram> {
        crate::pipeline::linked_program(cache, name, &mut self.warnings)
    }

    /// The step's program, or `passthrough` in its place
    fn resolve_program<'a>(&mut self, cache: &'a dyn ResourceCache, index: usize) -> Option<&'a ShaderProgram> {
        let name = self.steps[index].shader.clone();
        if let Some(program) = self.linked(cache, &name) {
            if !program.samples_depth() || self.depth_sampling {
                return Some(program);
            }
            let label = self.label.clone();
            self.warnings.warn(&format!("depth:{name}"), || {
                format!("Shader '{name}' samples depth but chain '{label}' has depth sampling off")
            });
        }
        let fallback = self.linked(cache, names::PASSTHROUGH);
        if fallback.is_none() {
            let label = self.label.clone();
            self.warnings.warn("no-passthrough", || {
                format!("Chain '{label}': no passthrough program, clearing instead")
            });
        }
        fallback
    }

    fn present_input(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        frame: &FrameContext,
        buffers: &[RenderTarget; 2],
    ) {
        if backend.supports_display_copy() {
            let (width, height) = self.size;
            backend.copy_texture(
                buffers[0].color.texture,
                frame.display.texture,
                width.min(frame.width),
                height.min(frame.height),
            );
            return;
        }
        match self.linked(cache, names::PASSTHROUGH) {
            Some(program) => {
                if let Err(e) = self.draw_step(
                    backend,
                    DISPLAY_SLOT,
                    program,
                    &BTreeMap::new(),
                    0,
                    buffers,
                    frame.display.view,
                ) {
                    self.report_failure(&e);
                    clear_view(backend, frame.display.view);
                }
            }
            None => clear_view(backend, frame.display.view),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_step(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        slot: usize,
        program: &ShaderProgram,
        overrides: &BTreeMap<String, ParamValue>,
        source: usize,
        buffers: &[RenderTarget; 2],
        dest_view: TextureViewHandle,
    ) -> BackendResult<()> {
        let shared = self.shared(backend)?;
        let (sampler, frame_uniforms) = (shared.sampler, shared.frame_uniforms);
        let layout = if program.samples_depth() {
            shared.depth_layout
        } else {
            shared.standard_layout
        };

        let params = self.step_params(backend, slot, program, overrides)?;

        let group = match self.groups.get(&(slot, source)).copied() {
            Some((revision, group)) if revision == program.revision() => group,
            stale => {
                if let Some((_, old)) = stale {
                    self.retired_groups.push(old);
                }
                let source_target = &buffers[source];
                let mut entries = vec![
                    (0, BindResource::Texture(source_target.color.view)),
                    (1, BindResource::Sampler(sampler)),
                    (2, BindResource::Buffer(frame_uniforms)),
                    (PARAMS_BINDING, BindResource::Buffer(params)),
                ];
                if program.samples_depth() {
                    entries.push((EXTRA_TEXTURE_BINDING, BindResource::Texture(source_target.depth.view)));
                }
                let group = backend.create_bind_group(layout, &entries)?;
                self.groups.insert((slot, source), (program.revision(), group));
                group
            }
        };

        let format = self.format;
        let pipeline = self
            .pipelines
            .get_or_create(backend, program, |p| fullscreen_pipeline(p, layout, format, Blend::Replace))?;

        backend.begin_render_pass(&RenderPassDescriptor::color(
            &format!("{} {}", self.label, program.name()),
            dest_view,
            LoadOp::Clear(CLEAR_COLOR),
        ));
        backend.set_render_pipeline(pipeline);
        backend.set_bind_group(0, group);
        backend.draw(0..3);
        backend.end_render_pass();
        Ok(())
    }

    /// Parameter buffer of a step, packed once per program revision
    fn step_params(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        slot: usize,
        program: &ShaderProgram,
        overrides: &BTreeMap<String, ParamValue>,
    ) -> BackendResult<BufferHandle> {
        if let Some(&(buffer, revision)) = self.params.get(&slot) {
            if revision == program.revision() {
                return Ok(buffer);
            }
            self.retired_buffers.push(buffer);
        }
        let block = program.pack_params(overrides);
        for name in &block.unknown {
            let shader = program.name().to_string();
            self.warnings.warn(&format!("param:{shader}:{name}"), || {
                format!("Shader '{shader}' has no parameter '{name}', ignoring it")
            });
        }
        let buffer = uniform_buffer(
            backend,
            &format!("{} step {} params", self.label, slot),
            block.bytes.len() as u64,
        )?;
        backend.write_buffer(buffer, 0, &block.bytes);
        self.params.insert(slot, (buffer, program.revision()));
        Ok(buffer)
    }

    fn draw_blend(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        program: &ShaderProgram,
        mode: BlendMode,
        buffers: &[RenderTarget; 2],
        overlay: OverlaySource<'_>,
    ) -> BackendResult<()> {
        let shared = self.shared(backend)?;
        let (sampler, frame_uniforms, layout) =
            (shared.sampler, shared.frame_uniforms, shared.blend_layout);

        let params = match self.blend_params.get(&mode) {
            Some(&buffer) => buffer,
            None => {
                let mut overrides = BTreeMap::new();
                overrides.insert("mode".to_string(), ParamValue::Scalar(mode.shader_value()));
                let block = program.pack_params(&overrides);
                let buffer = uniform_buffer(
                    backend,
                    &format!("{} blend {:?}", self.label, mode),
                    block.bytes.len() as u64,
                )?;
                backend.write_buffer(buffer, 0, &block.bytes);
                self.blend_params.insert(mode, buffer);
                buffer
            }
        };

        let key = (mode, overlay.label.to_string());
        let group = match self.blend_groups.get(&key).copied() {
            Some(cached)
                if cached.revision == program.revision()
                    && cached.generation == overlay.generation
                    && cached.view == overlay.view =>
            {
                cached.group
            }
            stale => {
                // The overlay was rebuilt or the program relinked
                if let Some(old) = stale {
                    self.retired_groups.push(old.group);
                }
                let group = backend.create_bind_group(
                    layout,
                    &[
                        (0, BindResource::Texture(buffers[0].color.view)),
                        (1, BindResource::Sampler(sampler)),
                        (2, BindResource::Buffer(frame_uniforms)),
                        (PARAMS_BINDING, BindResource::Buffer(params)),
                        (EXTRA_TEXTURE_BINDING, BindResource::Texture(overlay.view)),
                    ],
                )?;
                self.blend_groups.insert(
                    key,
                    BlendGroup {
                        revision: program.revision(),
                        generation: overlay.generation,
                        view: overlay.view,
                        group,
                    },
                );
                group
            }
        };

        let format = self.format;
        let pipeline = self
            .pipelines
            .get_or_create(backend, program, |p| fullscreen_pipeline(p, layout, format, Blend::Replace))?;

        backend.begin_render_pass(&RenderPassDescriptor::color(
            &format!("{} composite {:?}", self.label, mode),
            buffers[1].color.view,
            LoadOp::Clear(CLEAR_COLOR),
        ));
        backend.set_render_pipeline(pipeline);
        backend.set_bind_group(0, group);
        backend.draw(0..3);
        backend.end_render_pass();
        Ok(())
    }

    fn report_failure(&mut self, error: &BackendError) {
        let label = self.label.clone();
        self.warnings.error(&format!("backend:{error}"), || {
            format!("Postprocess chain '{label}' step failed: {error}")
        });
    }

    /// Move step bind groups and parameter buffers out for destruction
    fn retire_step_resources(&mut self) {
        self.retired_groups
            .extend(self.groups.drain().map(|(_, (_, group))| group));
        self.retired_buffers
            .extend(self.params.drain().map(|(_, (buffer, _))| buffer));
    }

    fn release_buffers(&mut self, backend: &mut dyn GraphicsBackend) {
        // Bind groups reference the buffers' views
        self.retired_groups
            .extend(self.groups.drain().map(|(_, (_, group))| group));
        self.retired_groups
            .extend(self.blend_groups.drain().map(|(_, cached)| cached.group));
        self.flush_retired(backend);
        if let Some(buffers) = self.buffers.take() {
            for target in buffers {
                target.destroy(backend);
            }
        }
        self.size = (0, 0);
    }

    fn flush_retired(&mut self, backend: &mut dyn GraphicsBackend) {
        for group in self.retired_groups.drain(..) {
            backend.destroy_bind_group(group);
        }
        for buffer in self.retired_buffers.drain(..) {
            backend.destroy_buffer(buffer);
        }
    }
}

/// Output of another chain as seen by a composite
struct OverlaySource<'a> {
    label: &'a str,
    generation: u64,
    view: TextureViewHandle,
}

#[derive(Debug, Clone, Copy)]
struct BlendGroup {
    revision: u64,
    generation: u64,
    view: TextureViewHandle,
    group: BindGroupHandle,
}

fn clear_view(backend: &mut dyn GraphicsBackend, view: TextureViewHandle) {
    backend.begin_render_pass(&RenderPassDescriptor::color(
        "Postprocess Clear",
        view,
        LoadOp::Clear(CLEAR_COLOR),
    ));
    backend.end_render_pass();
}

//! Headless backend that records commands and models texture contents.
//!
//! Each texture carries a 64-bit content fingerprint instead of pixels:
//! - a clear sets it from the clear value
//! - a draw derives it from the pipeline, the bound resources (buffer bytes
//!   and the fingerprints of sampled textures) and the draw range
//! - a copy propagates it
//!
//! Additive blending combines fingerprints with wrapping addition, so the
//! order of additive draws does not matter, exactly as on a GPU. Depth-tested
//! opaque draws are combined the same way because the depth test resolves
//! them independent of submission order. Alpha blending is order dependent.
//!
//! The backend also validates what wgpu would reject and records it as an
//! error instead of panicking: size mismatches in copies and passes, copies
//! inside a pass, and bindings or copies the texture role does not allow.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::ops::Range;

fn fingerprint<T: Hash>(value: T) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn clear_fingerprint(color: &[f32; 4]) -> u64 {
    fingerprint(("clear", color.map(f32::to_bits)))
}

/// A command as it reached the backend
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginPass {
        label: String,
        color: Vec<TextureHandle>,
        depth: Option<TextureHandle>,
    },
    Draw {
        pipeline: String,
        vertices: u32,
    },
    Copy {
        src: TextureHandle,
        dst: TextureHandle,
        width: u32,
        height: u32,
    },
    EndPass,
}

#[derive(Debug, Clone)]
struct TextureRecord {
    label: String,
    width: u32,
    height: u32,
    format: TextureFormat,
    sampled: bool,
    copy_src: bool,
    content: u64,
}

#[derive(Debug, Clone)]
struct PipelineRecord {
    label: String,
    source: u64,
    blends: Vec<Blend>,
    depth_write: bool,
}

#[derive(Debug, Clone)]
struct ActivePass {
    color: Vec<u64>,
    depth: Option<u64>,
    pipeline: Option<u64>,
    bind_groups: BTreeMap<u32, u64>,
    vertex_buffer: Option<u64>,
    index_buffer: Option<u64>,
}

/// Deterministic GPU-free backend
pub struct RecordingBackend {
    width: u32,
    height: u32,
    format: TextureFormat,
    display_copy: bool,
    display: GpuTexture,

    textures: HashMap<u64, TextureRecord>,
    views: HashMap<u64, u64>,
    buffers: HashMap<u64, Vec<u8>>,
    bind_groups: HashMap<u64, Vec<(u32, BindResource)>>,
    pipelines: HashMap<u64, PipelineRecord>,
    next_id: u64,

    in_frame: bool,
    frames: u64,
    pass: Option<ActivePass>,
    commands: Vec<RecordedCommand>,
    errors: Vec<String>,
    fail_texture_creation: bool,
}

impl RecordingBackend {
    /// Create a backend with a `width` x `height` display
    pub fn new(width: u32, height: u32) -> Self {
        let mut backend = Self {
            width,
            height,
            format: TextureFormat::Bgra8UnormSrgb,
            display_copy: true,
            display: GpuTexture {
                texture: TextureHandle(0),
                view: TextureViewHandle(0),
            },
            textures: HashMap::new(),
            views: HashMap::new(),
            buffers: HashMap::new(),
            bind_groups: HashMap::new(),
            pipelines: HashMap::new(),
            next_id: 1,
            in_frame: false,
            frames: 0,
            pass: None,
            commands: Vec::new(),
            errors: Vec::new(),
            fail_texture_creation: false,
        };
        backend.display = GpuTexture {
            texture: TextureHandle(backend.alloc_id()),
            view: TextureViewHandle(backend.alloc_id()),
        };
        // The display can be rendered to and copied into, nothing else
        backend.textures.insert(
            backend.display.texture.0,
            TextureRecord {
                label: "display".into(),
                width,
                height,
                format: backend.format,
                sampled: false,
                copy_src: false,
                content: 0,
            },
        );
        backend.views.insert(backend.display.view.0, backend.display.texture.0);
        backend
    }

    pub fn with_display_copy(mut self, supported: bool) -> Self {
        self.display_copy = supported;
        self
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn error(&mut self, message: String) {
        log::error!("{}", message);
        self.errors.push(message);
    }

    /// Make every following `create_texture` fail
    pub fn set_fail_texture_creation(&mut self, fail: bool) {
        self.fail_texture_creation = fail;
    }

    pub fn display_texture(&self) -> TextureHandle {
        self.display.texture
    }

    /// Fingerprint of the display texture
    pub fn display_content(&self) -> u64 {
        self.texture_content(self.display_texture()).unwrap_or_default()
    }

    pub fn texture_content(&self, texture: TextureHandle) -> Option<u64> {
        self.textures.get(&texture.0).map(|t| t.content)
    }

    pub fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&texture.0).map(|t| (t.width, t.height))
    }

    pub fn texture_label(&self, texture: TextureHandle) -> Option<&str> {
        self.textures.get(&texture.0).map(|t| t.label.as_str())
    }

    /// Texture behind a view
    pub fn view_texture(&self, view: TextureViewHandle) -> Option<TextureHandle> {
        self.views.get(&view.0).map(|t| TextureHandle(*t))
    }

    /// Number of live textures, the display excluded
    pub fn live_textures(&self) -> usize {
        self.textures.len() - 1
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_bind_groups(&self) -> usize {
        self.bind_groups.len()
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Draws recorded since the last `clear_commands`
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Draw { .. }))
            .count()
    }

    /// Labels of pipelines drawn with, in order
    pub fn drawn_pipelines(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::Draw { pipeline, .. } => Some(pipeline.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Validation failures wgpu would have reported
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn inputs_fingerprint(&self, pass: &ActivePass) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (index, group) in &pass.bind_groups {
            index.hash(&mut hasher);
            let Some(entries) = self.bind_groups.get(group) else {
                continue;
            };
            for (binding, entry) in entries {
                binding.hash(&mut hasher);
                match entry {
                    BindResource::Buffer(buffer) => self.buffers.get(&buffer.0).hash(&mut hasher),
                    BindResource::BufferSlice { buffer, offset, size } => {
                        if let Some(bytes) = self.buffers.get(&buffer.0) {
                            let start = (*offset as usize).min(bytes.len());
                            let end = (start + *size as usize).min(bytes.len());
                            bytes[start..end].hash(&mut hasher);
                        }
                    }
                    BindResource::Texture(view) => {
                        let content = self
                            .views
                            .get(&view.0)
                            .and_then(|t| self.textures.get(t))
                            .map(|t| t.content);
                        content.hash(&mut hasher);
                    }
                    BindResource::Sampler(_) => {}
                }
            }
        }
        for buffer in pass.vertex_buffer.iter().chain(pass.index_buffer.iter()) {
            self.buffers.get(buffer).hash(&mut hasher);
        }
        hasher.finish()
    }

    fn record_draw(&mut self, range: Range<u32>) {
        let Some(pass) = self.pass.clone() else {
            self.error("draw outside a render pass".into());
            return;
        };
        let Some(pipeline_id) = pass.pipeline else {
            self.error("draw without a pipeline".into());
            return;
        };
        let Some(pipeline) = self.pipelines.get(&pipeline_id).cloned() else {
            self.error(format!("draw with unknown pipeline {}", pipeline_id));
            return;
        };

        let inputs = self.inputs_fingerprint(&pass);
        let depth_tested = pass.depth.is_some() && pipeline.depth_write;
        for (slot, texture) in pass.color.iter().enumerate() {
            let written = fingerprint((pipeline.source, slot, inputs, range.clone()));
            let blend = pipeline.blends.get(slot).copied().unwrap_or_default();
            let Some(record) = self.textures.get_mut(texture) else {
                continue;
            };
            record.content = match blend {
                Blend::Additive => record.content.wrapping_add(written),
                Blend::Alpha => fingerprint((record.content, written)),
                Blend::Replace if depth_tested => record.content.wrapping_add(written),
                Blend::Replace => written,
            };
        }
        if depth_tested {
            if let Some(record) = pass.depth.and_then(|d| self.textures.get_mut(&d)) {
                record.content = record.content.wrapping_add(fingerprint((pipeline.source, inputs, range.clone())));
            }
        }

        self.commands.push(RecordedCommand::Draw {
            pipeline: pipeline.label,
            vertices: range.len() as u32,
        });
    }

    fn check_bindings(&self, entries: &[(u32, BindResource)]) -> BackendResult<()> {
        let fail = |reason: String| Err(BackendError::create(ResourceKind::BindGroup, "", reason));
        for (binding, entry) in entries {
            match entry {
                BindResource::Texture(view) => {
                    let Some(texture) = self.views.get(&view.0).and_then(|t| self.textures.get(t)) else {
                        return fail(format!("binding {}: view {} not found", binding, view.0));
                    };
                    if !texture.sampled {
                        return fail(format!("binding {}: '{}' cannot be sampled", binding, texture.label));
                    }
                }
                BindResource::Buffer(buffer) | BindResource::BufferSlice { buffer, .. }
                    if !self.buffers.contains_key(&buffer.0) =>
                {
                    return fail(format!("binding {}: buffer {} not found", binding, buffer.0));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl GraphicsBackend for RecordingBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        if let Some(display) = self.textures.get_mut(&self.display.texture.0) {
            display.width = width;
            display.height = height;
            display.content = 0;
        }
    }

    fn display_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn display_format(&self) -> TextureFormat {
        self.format
    }

    fn supports_display_copy(&self) -> bool {
        self.display_copy
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        if self.in_frame {
            self.error("begin_frame called twice".into());
        }
        self.in_frame = true;
        Ok(FrameContext {
            display: self.display,
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if self.pass.is_some() {
            self.error("end_frame with an open render pass".into());
            self.pass = None;
        }
        self.in_frame = false;
        self.frames += 1;
        Ok(())
    }

    fn create_buffer(&mut self, label: &str, kind: BufferKind, size: u64) -> BackendResult<BufferHandle> {
        let id = self.alloc_id();
        self.buffers.insert(id, vec![0; size as usize]);
        log::trace!("Created {:?} buffer {} ({})", kind, id, label);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(&mut self, label: &str, kind: BufferKind, contents: &[u8]) -> BackendResult<BufferHandle> {
        let id = self.alloc_id();
        self.buffers.insert(id, contents.to_vec());
        log::trace!("Created {:?} buffer {} ({})", kind, id, label);
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let Some(bytes) = self.buffers.get_mut(&buffer.0) else {
            self.error(format!("write to unknown buffer {}", buffer.0));
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > bytes.len() {
            let len = bytes.len();
            self.error(format!("write of {}..{} overruns buffer of {} bytes", start, end, len));
            return;
        }
        bytes[start..end].copy_from_slice(data);
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<GpuTexture> {
        if self.fail_texture_creation {
            return Err(BackendError::create(ResourceKind::Texture, &desc.label, "injected failure"));
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::create(
                ResourceKind::Texture,
                &desc.label,
                format!("invalid size {}x{}", desc.width, desc.height),
            ));
        }
        let texture = GpuTexture {
            texture: TextureHandle(self.alloc_id()),
            view: TextureViewHandle(self.alloc_id()),
        };
        self.textures.insert(
            texture.texture.0,
            TextureRecord {
                label: desc.label.clone(),
                width: desc.width,
                height: desc.height,
                format: desc.format,
                sampled: desc.role.sampled(),
                copy_src: desc.role.copy_source(),
                content: 0,
            },
        );
        self.views.insert(texture.view.0, texture.texture.0);
        log::trace!("Created texture {} ({}, {}x{})", texture.texture.0, desc.label, desc.width, desc.height);
        Ok(texture)
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        match self.textures.get_mut(&texture.0) {
            Some(record) => record.content = fingerprint((data, width, height)),
            None => self.error(format!("write to unknown texture {}", texture.0)),
        }
    }

    fn create_sampler(&mut self, _label: &str, _wrap: Wrap) -> BackendResult<SamplerHandle> {
        Ok(SamplerHandle(self.alloc_id()))
    }

    fn create_bind_group_layout(&mut self, _entries: &[(u32, Binding)]) -> BackendResult<BindGroupLayoutHandle> {
        Ok(BindGroupLayoutHandle(self.alloc_id()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        entries: &[(u32, BindResource)],
    ) -> BackendResult<BindGroupHandle> {
        self.check_bindings(entries)?;
        let id = self.alloc_id();
        self.bind_groups.insert(id, entries.to_vec());
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<RenderPipelineHandle> {
        let id = self.alloc_id();
        self.pipelines.insert(
            id,
            PipelineRecord {
                label: desc.label.clone(),
                source: fingerprint((&desc.label, &desc.wgsl)),
                blends: desc.targets.iter().map(|&(_, blend)| blend).collect(),
                depth_write: desc.depth.is_some_and(|test| test.write),
            },
        );
        log::trace!("Created render pipeline {} ({})", id, desc.label);
        Ok(RenderPipelineHandle(id))
    }

    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle, width: u32, height: u32) {
        if self.pass.is_some() {
            self.error("copy inside a render pass".into());
            return;
        }
        let (Some(source), Some(dest)) = (
            self.textures.get(&src.0).cloned(),
            self.textures.get(&dst.0).cloned(),
        ) else {
            self.error(format!("copy between unknown textures {} -> {}", src.0, dst.0));
            return;
        };
        let problem = if !source.copy_src {
            Some(format!("copy source '{}' cannot be copied from", source.label))
        } else if dst == self.display.texture && !self.display_copy {
            Some("display does not accept copies".to_string())
        } else if source.format != dest.format {
            Some(format!(
                "copy format mismatch {:?} -> {:?}",
                source.format, dest.format
            ))
        } else if width > source.width.min(dest.width) || height > source.height.min(dest.height) {
            Some(format!(
                "copy of {}x{} does not fit {}x{} -> {}x{}",
                width, height, source.width, source.height, dest.width, dest.height
            ))
        } else {
            None
        };
        if let Some(message) = problem {
            self.error(message);
            return;
        }

        // Partial copies keep a trace of the old destination content
        let full = width == dest.width && height == dest.height;
        let content = if full {
            source.content
        } else {
            fingerprint((dest.content, source.content, width, height))
        };
        if let Some(dest) = self.textures.get_mut(&dst.0) {
            dest.content = content;
        }
        self.commands.push(RecordedCommand::Copy { src, dst, width, height });
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        if self.pass.is_some() {
            self.error("render pass begun while another is open".into());
        }

        let mut color = Vec::new();
        let mut sizes = Vec::new();
        for (view, load) in &desc.colors {
            let Some(texture) = self.views.get(&view.0).copied() else {
                self.error(format!("unknown color attachment view {}", view.0));
                continue;
            };
            if let Some(record) = self.textures.get_mut(&texture) {
                if let LoadOp::Clear(c) = load {
                    record.content = clear_fingerprint(c);
                }
                sizes.push((record.width, record.height));
            }
            color.push(texture);
        }

        let depth = desc.depth.as_ref().and_then(|(view, load)| {
            let texture = self.views.get(&view.0).copied()?;
            let record = self.textures.get_mut(&texture)?;
            if let LoadOp::Clear(value) = load {
                record.content = fingerprint(("depth", value.to_bits()));
            }
            sizes.push((record.width, record.height));
            Some(texture)
        });

        if sizes.windows(2).any(|w| w[0] != w[1]) {
            self.error(format!("attachment size mismatch in '{}': {:?}", desc.label, sizes));
        }

        self.commands.push(RecordedCommand::BeginPass {
            label: desc.label.clone(),
            color: color.iter().map(|t| TextureHandle(*t)).collect(),
            depth: depth.map(TextureHandle),
        });
        self.pass = Some(ActivePass {
            color,
            depth,
            pipeline: None,
            bind_groups: BTreeMap::new(),
            vertex_buffer: None,
            index_buffer: None,
        });
    }

    fn end_render_pass(&mut self) {
        if self.pass.take().is_some() {
            self.commands.push(RecordedCommand::EndPass);
        }
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        if let Some(pass) = self.pass.as_mut() {
            pass.pipeline = Some(pipeline.0);
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        if let Some(pass) = self.pass.as_mut() {
            pass.bind_groups.insert(index, bind_group.0);
        }
    }

    fn set_vertex_buffer(&mut self, buffer: BufferHandle) {
        if let Some(pass) = self.pass.as_mut() {
            pass.vertex_buffer = Some(buffer.0);
        }
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle) {
        if let Some(pass) = self.pass.as_mut() {
            pass.index_buffer = Some(buffer.0);
        }
    }

    fn draw(&mut self, vertices: Range<u32>) {
        self.record_draw(vertices);
    }

    fn draw_indexed(&mut self, indices: Range<u32>) {
        self.record_draw(indices);
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        if texture == self.display {
            self.error("attempt to destroy the display texture".into());
            return;
        }
        self.views.remove(&texture.view.0);
        if self.textures.remove(&texture.texture.0).is_some() {
            log::trace!("Destroyed texture {}", texture.texture.0);
        }
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn color_texture(backend: &mut RecordingBackend, w: u32, h: u32) -> GpuTexture {
        backend
            .create_texture(&TextureDescriptor::new(
                "color",
                w,
                h,
                TextureFormat::Bgra8UnormSrgb,
                TextureRole::Color,
            ))
            .unwrap()
    }

    fn pipeline(backend: &mut RecordingBackend, label: &str, blend: Blend) -> RenderPipelineHandle {
        backend
            .create_render_pipeline(&PipelineDescriptor {
                label: label.into(),
                wgsl: label.into(),
                vertex_layout: None,
                bind_layouts: vec![],
                topology: Topology::Triangles,
                depth: None,
                targets: vec![(TextureFormat::Bgra8UnormSrgb, blend)],
            })
            .unwrap()
    }

    fn draw_with(backend: &mut RecordingBackend, target: GpuTexture, pipe: RenderPipelineHandle, load: LoadOp<[f32; 4]>) {
        backend.begin_render_pass(&RenderPassDescriptor::color("test", target.view, load));
        backend.set_render_pipeline(pipe);
        backend.draw(0..3);
        backend.end_render_pass();
    }

    // ============================================================================
    // Blending
    // ============================================================================

    /// Drawing "one" then "two" matches "two" then "one" only for additive blending.
    #[rstest]
    #[case::additive(Blend::Additive, true)]
    #[case::alpha(Blend::Alpha, false)]
    fn test_blend_order(#[case] blend: Blend, #[case] commutes: bool) {
        let mut backend = RecordingBackend::new(4, 4);
        let a = color_texture(&mut backend, 4, 4);
        let b = color_texture(&mut backend, 4, 4);
        let p1 = pipeline(&mut backend, "one", blend);
        let p2 = pipeline(&mut backend, "two", blend);

        draw_with(&mut backend, a, p1, LoadOp::Clear([0.0; 4]));
        draw_with(&mut backend, a, p2, LoadOp::Load);
        draw_with(&mut backend, b, p2, LoadOp::Clear([0.0; 4]));
        draw_with(&mut backend, b, p1, LoadOp::Load);

        let same = backend.texture_content(a.texture) == backend.texture_content(b.texture);
        assert_eq!(same, commutes);
        assert!(backend.errors().is_empty());
    }

    /// A replacing draw without depth discards what was there before.
    #[test]
    fn test_replace_overwrites() {
        let mut backend = RecordingBackend::new(4, 4);
        let a = color_texture(&mut backend, 4, 4);
        let b = color_texture(&mut backend, 4, 4);
        let fill = pipeline(&mut backend, "fill", Blend::Replace);

        draw_with(&mut backend, a, fill, LoadOp::Clear([1.0, 0.0, 0.0, 1.0]));
        draw_with(&mut backend, b, fill, LoadOp::Clear([0.0, 0.0, 1.0, 1.0]));

        assert_eq!(backend.texture_content(a.texture), backend.texture_content(b.texture));
    }

    // ============================================================================
    // Copies
    // ============================================================================

    #[test]
    fn test_copy_propagates_and_validates_size() {
        let mut backend = RecordingBackend::new(4, 4);
        let src = color_texture(&mut backend, 4, 4);
        let dst = color_texture(&mut backend, 4, 4);
        let small = color_texture(&mut backend, 2, 2);
        let p = pipeline(&mut backend, "fill", Blend::Replace);
        draw_with(&mut backend, src, p, LoadOp::Clear([0.0; 4]));

        backend.copy_texture(src.texture, dst.texture, 4, 4);
        assert_eq!(backend.texture_content(src.texture), backend.texture_content(dst.texture));
        assert!(backend.errors().is_empty());

        backend.copy_texture(src.texture, small.texture, 4, 4);
        assert_eq!(backend.errors().len(), 1);
    }

    /// The display takes copies only when the backend says it does, and never acts as a source.
    #[rstest]
    #[case::supported(true, 1)]
    #[case::unsupported(false, 2)]
    fn test_display_copy(#[case] supported: bool, #[case] errors: usize) {
        let mut backend = RecordingBackend::new(4, 4).with_display_copy(supported);
        let frame = backend.begin_frame().unwrap();
        let src = color_texture(&mut backend, 4, 4);

        backend.copy_texture(src.texture, frame.display.texture, 4, 4);
        backend.copy_texture(frame.display.texture, src.texture, 4, 4);

        assert_eq!(backend.errors().len(), errors);
    }

    // ============================================================================
    // Creation failures
    // ============================================================================

    #[test]
    fn test_injected_texture_failure() {
        let mut backend = RecordingBackend::new(4, 4);
        backend.set_fail_texture_creation(true);
        let result = backend.create_texture(&TextureDescriptor::new(
            "upload",
            1,
            1,
            TextureFormat::Rgba8Unorm,
            TextureRole::Upload,
        ));
        assert!(matches!(
            result,
            Err(BackendError::Create {
                kind: ResourceKind::Texture,
                ..
            })
        ));
        assert_eq!(backend.live_textures(), 0);
    }

    /// Depth created without sampling cannot be bound as a texture.
    #[rstest]
    #[case::sampled(true, true)]
    #[case::attachment_only(false, false)]
    fn test_depth_binding_follows_role(#[case] sampled: bool, #[case] binds: bool) {
        let mut backend = RecordingBackend::new(4, 4);
        let depth = backend
            .create_texture(&TextureDescriptor::new(
                "depth",
                4,
                4,
                DEPTH_FORMAT,
                TextureRole::Depth { sampled },
            ))
            .unwrap();
        let layout = backend.create_bind_group_layout(&[(0, Binding::Depth)]).unwrap();

        let result = backend.create_bind_group(layout, &[(0, BindResource::Texture(depth.view))]);

        assert_eq!(result.is_ok(), binds);
    }
}

//! wgpu backend implementation
//!
//! Render pass commands are buffered and replayed when the pass ends, so the
//! trait methods never have to hold a borrow of the encoder. The display is
//! either a window surface or, in headless mode, an owned texture of the
//! same format and usage.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Buffered render pass command
#[derive(Clone)]
enum RenderCommand {
    SetPipeline(RenderPipelineHandle),
    SetBindGroup { index: u32, bind_group: BindGroupHandle },
    SetVertexBuffer(BufferHandle),
    SetIndexBuffer(BufferHandle),
    Draw(Range<u32>),
    DrawIndexed(Range<u32>),
}

/// Pending render pass with buffered commands
struct PendingRenderPass {
    descriptor: RenderPassDescriptor,
    commands: Vec<RenderCommand>,
}

/// Where frames end up
enum Display {
    Surface {
        surface: wgpu::Surface<'static>,
        current: Option<wgpu::SurfaceTexture>,
    },
    Offscreen(wgpu::Texture),
}

/// wgpu backend implementation
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    display: Display,
    display_config: wgpu::SurfaceConfiguration,
    display_copy_supported: bool,
    // Fresh per frame so handles from an old frame never alias the new display
    current_display: GpuTexture,

    buffers: HashMap<u64, wgpu::Buffer>,
    textures: HashMap<u64, wgpu::Texture>,
    texture_views: HashMap<u64, wgpu::TextureView>,
    samplers: HashMap<u64, wgpu::Sampler>,
    bind_group_layouts: HashMap<u64, wgpu::BindGroupLayout>,
    bind_groups: HashMap<u64, wgpu::BindGroup>,
    render_pipelines: HashMap<u64, wgpu::RenderPipeline>,
    next_id: u64,

    encoder: Option<wgpu::CommandEncoder>,
    pending_render_pass: Option<PendingRenderPass>,
}

fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn display_format_of(format: wgpu::TextureFormat) -> TextureFormat {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        wgpu::TextureFormat::Rgba8UnormSrgb => TextureFormat::Rgba8UnormSrgb,
        wgpu::TextureFormat::Bgra8Unorm => TextureFormat::Bgra8Unorm,
        wgpu::TextureFormat::Bgra8UnormSrgb => TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba16Float => TextureFormat::Rgba16Float,
        _ => TextureFormat::Rgba8Unorm,
    }
}

fn texture_usages(role: TextureRole) -> wgpu::TextureUsages {
    let mut usages = wgpu::TextureUsages::COPY_DST;
    if role.attachable() {
        usages |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if role.sampled() {
        usages |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if role.copy_source() {
        usages |= wgpu::TextureUsages::COPY_SRC;
    }
    usages
}

fn buffer_usages(kind: BufferKind) -> wgpu::BufferUsages {
    wgpu::BufferUsages::COPY_DST
        | match kind {
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferKind::Storage => wgpu::BufferUsages::STORAGE,
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        }
}

fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

fn blend_state(blend: Blend) -> Option<wgpu::BlendState> {
    match blend {
        Blend::Replace => None,
        Blend::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
        Blend::Additive => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::REPLACE,
        }),
    }
}

fn binding_entry(binding: u32, kind: Binding) -> wgpu::BindGroupLayoutEntry {
    let (visibility, ty) = match kind {
        Binding::Uniform => (
            wgpu::ShaderStages::VERTEX_FRAGMENT,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        ),
        Binding::Storage => (
            wgpu::ShaderStages::FRAGMENT,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
        ),
        Binding::Texture { filterable } => (
            wgpu::ShaderStages::FRAGMENT,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
        ),
        Binding::Depth => (
            wgpu::ShaderStages::FRAGMENT,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
        ),
        Binding::Sampler => (
            wgpu::ShaderStages::FRAGMENT,
            wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        ),
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty,
        count: None,
    }
}

fn load_op<T, V>(op: &LoadOp<T>, clear: impl FnOnce(&T) -> V) -> wgpu::LoadOp<V> {
    match op {
        LoadOp::Clear(value) => wgpu::LoadOp::Clear(clear(value)),
        LoadOp::Load => wgpu::LoadOp::Load,
    }
}

/// Clamp to device limits while keeping the aspect ratio
fn clamp_to_limit(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width > max_size || height > max_size {
        let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
        (
            ((width as f32 * scale) as u32).max(1),
            ((height as f32 * scale) as u32).max(1),
        )
    } else {
        (width.max(1), height.max(1))
    }
}

impl WgpuBackend {
    /// Create a backend presenting to `window`
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    pub async fn new_async(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| BackendError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::NoDevice("no suitable adapter found".into()))?;

        let (device, queue) = Self::request_device(&adapter).await?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| BackendError::Surface("surface has no formats".into()))?;

        // The zero-step postprocess path copies straight into the surface
        let display_copy_supported = surface_caps.usages.contains(wgpu::TextureUsages::COPY_DST);
        let usage = if display_copy_supported {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST
        } else {
            log::warn!("Surface does not accept copies; display blits fall back to draws");
            wgpu::TextureUsages::RENDER_ATTACHMENT
        };

        let (width, height) =
            clamp_to_limit(size.width, size.height, device.limits().max_texture_dimension_2d);

        let display_config = wgpu::SurfaceConfiguration {
            usage,
            format: surface_format,
            width,
            height,
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &display_config);

        Ok(Self::from_parts(
            device,
            queue,
            Display::Surface {
                surface,
                current: None,
            },
            display_config,
            display_copy_supported,
        ))
    }

    /// Create a backend rendering into an owned offscreen display texture
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new_headless(width: u32, height: u32) -> BackendResult<Self> {
        pollster::block_on(Self::new_headless_async(width, height))
    }

    pub async fn new_headless_async(width: u32, height: u32) -> BackendResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::NoDevice("no suitable adapter found".into()))?;

        let (device, queue) = Self::request_device(&adapter).await?;
        let (width, height) = clamp_to_limit(width, height, device.limits().max_texture_dimension_2d);

        let display_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        let texture = Self::create_offscreen_display(&device, &display_config);

        Ok(Self::from_parts(
            device,
            queue,
            Display::Offscreen(texture),
            display_config,
            true,
        ))
    }

    async fn request_device(adapter: &wgpu::Adapter) -> BackendResult<(wgpu::Device, wgpu::Queue)> {
        let info = adapter.get_info();
        log::info!("Selected GPU: {} ({:?} backend)", info.name, info.backend);

        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Scene Engine Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::NoDevice(e.to_string()))
    }

    fn create_offscreen_display(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Display"),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: config.format,
            usage: config.usage,
            view_formats: &[],
        })
    }

    fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        display: Display,
        display_config: wgpu::SurfaceConfiguration,
        display_copy_supported: bool,
    ) -> Self {
        Self {
            device,
            queue,
            display,
            display_config,
            display_copy_supported,
            current_display: GpuTexture {
                texture: TextureHandle(0),
                view: TextureViewHandle(0),
            },
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_views: HashMap::new(),
            samplers: HashMap::new(),
            bind_group_layouts: HashMap::new(),
            bind_groups: HashMap::new(),
            render_pipelines: HashMap::new(),
            next_id: 1,
            encoder: None,
            pending_render_pass: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn display_texture(&self) -> Option<&wgpu::Texture> {
        match &self.display {
            Display::Surface { current, .. } => current.as_ref().map(|t| &t.texture),
            Display::Offscreen(texture) => Some(texture),
        }
    }

    fn record(&mut self, command: RenderCommand) {
        if let Some(pending) = self.pending_render_pass.as_mut() {
            pending.commands.push(command);
        }
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn resolve_texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        if handle == self.current_display.texture {
            self.display_texture()
        } else {
            self.textures.get(&handle.0)
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let (width, height) =
            clamp_to_limit(width, height, self.device.limits().max_texture_dimension_2d);
        self.display_config.width = width;
        self.display_config.height = height;
        match &mut self.display {
            Display::Surface { surface, .. } => surface.configure(&self.device, &self.display_config),
            Display::Offscreen(texture) => {
                *texture = Self::create_offscreen_display(&self.device, &self.display_config);
            }
        }
    }

    fn display_size(&self) -> (u32, u32) {
        (self.display_config.width, self.display_config.height)
    }

    fn display_format(&self) -> TextureFormat {
        display_format_of(self.display_config.format)
    }

    fn supports_display_copy(&self) -> bool {
        self.display_copy_supported
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        if let Display::Surface { surface, current } = &mut self.display {
            let output = surface.get_current_texture().map_err(|e| match e {
                wgpu::SurfaceError::Lost => BackendError::SurfaceLost,
                wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
                _ => BackendError::Surface(e.to_string()),
            })?;
            *current = Some(output);
        }

        self.current_display = GpuTexture {
            texture: TextureHandle(self.alloc_id()),
            view: TextureViewHandle(self.alloc_id()),
        };
        self.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                }),
        );

        Ok(FrameContext {
            display: self.current_display,
            width: self.display_config.width,
            height: self.display_config.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        if let Display::Surface { current, .. } = &mut self.display {
            if let Some(texture) = current.take() {
                texture.present();
            }
        }
        Ok(())
    }

    fn create_buffer(&mut self, label: &str, kind: BufferKind, size: u64) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: buffer_usages(kind),
            mapped_at_creation: false,
        });
        let id = self.alloc_id();
        self.buffers.insert(id, buffer);
        log::trace!("Created buffer {} ({}, {} bytes)", id, label, size);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(&mut self, label: &str, kind: BufferKind, contents: &[u8]) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: buffer_usages(kind),
        });
        let id = self.alloc_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(buf) = self.buffers.get(&buffer.0) {
            self.queue.write_buffer(buf, offset, data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<GpuTexture> {
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(BackendError::create(
                ResourceKind::Texture,
                &desc.label,
                format!("invalid size {}x{}", desc.width, desc.height),
            ));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label.as_str()),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: texture_usages(desc.role),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let handle = GpuTexture {
            texture: TextureHandle(self.alloc_id()),
            view: TextureViewHandle(self.alloc_id()),
        };
        self.textures.insert(handle.texture.0, texture);
        self.texture_views.insert(handle.view.0, view);
        log::trace!("Created texture {} ({}, {}x{})", handle.texture.0, desc.label, desc.width, desc.height);
        Ok(handle)
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        if let Some(tex) = self.textures.get(&texture.0) {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: tex,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    fn create_sampler(&mut self, label: &str, wrap: Wrap) -> BackendResult<SamplerHandle> {
        let address_mode = match wrap {
            Wrap::Clamp => wgpu::AddressMode::ClampToEdge,
            Wrap::Repeat => wgpu::AddressMode::Repeat,
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let id = self.alloc_id();
        self.samplers.insert(id, sampler);
        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(&mut self, entries: &[(u32, Binding)]) -> BackendResult<BindGroupLayoutHandle> {
        let wgpu_entries: Vec<wgpu::BindGroupLayoutEntry> = entries
            .iter()
            .map(|&(binding, kind)| binding_entry(binding, kind))
            .collect();
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &wgpu_entries,
            });
        let id = self.alloc_id();
        self.bind_group_layouts.insert(id, layout);
        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindResource)],
    ) -> BackendResult<BindGroupHandle> {
        let missing = |what: String| BackendError::create(ResourceKind::BindGroup, "", what);
        let layout_ref = self
            .bind_group_layouts
            .get(&layout.0)
            .ok_or_else(|| missing(format!("layout {} not found", layout.0)))?;

        let mut wgpu_entries = Vec::with_capacity(entries.len());
        for &(binding, entry) in entries {
            let buffer = |handle: BufferHandle| {
                self.buffers
                    .get(&handle.0)
                    .ok_or_else(|| missing(format!("binding {}: buffer {} not found", binding, handle.0)))
            };
            let resource = match entry {
                BindResource::Buffer(handle) => buffer(handle)?.as_entire_binding(),
                BindResource::BufferSlice { buffer: handle, offset, size } => {
                    wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: buffer(handle)?,
                        offset,
                        size: std::num::NonZeroU64::new(size),
                    })
                }
                BindResource::Texture(view) => wgpu::BindingResource::TextureView(
                    self.texture_views
                        .get(&view.0)
                        .ok_or_else(|| missing(format!("binding {}: view {} not found", binding, view.0)))?,
                ),
                BindResource::Sampler(sampler) => wgpu::BindingResource::Sampler(
                    self.samplers
                        .get(&sampler.0)
                        .ok_or_else(|| missing(format!("binding {}: sampler {} not found", binding, sampler.0)))?,
                ),
            };
            wgpu_entries.push(wgpu::BindGroupEntry { binding, resource });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: layout_ref,
            entries: &wgpu_entries,
        });
        let id = self.alloc_id();
        self.bind_groups.insert(id, bind_group);
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(&mut self, desc: &PipelineDescriptor) -> BackendResult<RenderPipelineHandle> {
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label.as_str()),
                source: wgpu::ShaderSource::Wgsl(desc.wgsl.as_str().into()),
            });

        let layouts = desc
            .bind_layouts
            .iter()
            .map(|h| {
                self.bind_group_layouts.get(&h.0).ok_or_else(|| {
                    BackendError::create(ResourceKind::Pipeline, &desc.label, format!("layout {} not found", h.0))
                })
            })
            .collect::<BackendResult<Vec<&wgpu::BindGroupLayout>>>()?;
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        let attributes: Vec<wgpu::VertexAttribute> = desc
            .vertex_layout
            .iter()
            .flat_map(|layout| layout.attributes())
            .map(|&(location, format, offset)| wgpu::VertexAttribute {
                format: vertex_format(format),
                offset,
                shader_location: location,
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex_layout
            .iter()
            .map(|layout| wgpu::VertexBufferLayout {
                array_stride: layout.stride(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            })
            .collect();

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .targets
            .iter()
            .map(|&(format, blend)| {
                Some(wgpu::ColorTargetState {
                    format: texture_format(format),
                    blend: blend_state(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let primitive = wgpu::PrimitiveState {
            topology: match desc.topology {
                Topology::Lines => wgpu::PrimitiveTopology::LineList,
                Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
            },
            // Wireframe and transparent meshes are seen from both sides
            cull_mode: None,
            ..Default::default()
        };

        let depth_stencil = desc.depth.map(|test| wgpu::DepthStencilState {
            format: texture_format(DEPTH_FORMAT),
            depth_write_enabled: test.write,
            depth_compare: match test.compare {
                DepthCompare::Less => wgpu::CompareFunction::Less,
                DepthCompare::LessEqual => wgpu::CompareFunction::LessEqual,
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label.as_str()),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive,
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        let id = self.alloc_id();
        self.render_pipelines.insert(id, pipeline);
        log::trace!("Created render pipeline {} ({})", id, desc.label);
        Ok(RenderPipelineHandle(id))
    }

    fn copy_texture(&mut self, src: TextureHandle, dst: TextureHandle, width: u32, height: u32) {
        if self.pending_render_pass.is_some() {
            log::error!("copy_texture called inside a render pass");
            return;
        }
        let Some(mut encoder) = self.encoder.take() else {
            log::warn!("copy_texture called outside a frame");
            return;
        };
        if let (Some(src_tex), Some(dst_tex)) = (self.resolve_texture(src), self.resolve_texture(dst)) {
            encoder.copy_texture_to_texture(
                src_tex.as_image_copy(),
                dst_tex.as_image_copy(),
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
        self.encoder = Some(encoder);
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.pending_render_pass = Some(PendingRenderPass {
            descriptor: desc.clone(),
            commands: Vec::new(),
        });
    }

    fn end_render_pass(&mut self) {
        let Some(pending) = self.pending_render_pass.take() else {
            return;
        };
        let Some(mut encoder) = self.encoder.take() else {
            return;
        };

        let display_view: Option<wgpu::TextureView> = self
            .display_texture()
            .map(|tex| tex.create_view(&wgpu::TextureViewDescriptor::default()));
        let display = self.current_display.view;
        let lookup = |view: TextureViewHandle| {
            if view == display {
                display_view.as_ref()
            } else {
                self.texture_views.get(&view.0)
            }
        };

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = pending
            .descriptor
            .colors
            .iter()
            .map(|(view, load)| {
                lookup(*view).map(|view| wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: load_op(load, |c| wgpu::Color {
                            r: c[0] as f64,
                            g: c[1] as f64,
                            b: c[2] as f64,
                            a: c[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let depth_attachment = pending.descriptor.depth.as_ref().and_then(|(view, load)| {
            lookup(*view).map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: load_op(load, |depth| *depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            })
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(pending.descriptor.label.as_str()),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for cmd in &pending.commands {
                match cmd {
                    RenderCommand::SetPipeline(handle) => {
                        if let Some(pipeline) = self.render_pipelines.get(&handle.0) {
                            render_pass.set_pipeline(pipeline);
                        }
                    }
                    RenderCommand::SetBindGroup { index, bind_group } => {
                        if let Some(bg) = self.bind_groups.get(&bind_group.0) {
                            render_pass.set_bind_group(*index, bg, &[]);
                        }
                    }
                    RenderCommand::SetVertexBuffer(buffer) => {
                        if let Some(buf) = self.buffers.get(&buffer.0) {
                            render_pass.set_vertex_buffer(0, buf.slice(..));
                        }
                    }
                    RenderCommand::SetIndexBuffer(buffer) => {
                        if let Some(buf) = self.buffers.get(&buffer.0) {
                            render_pass.set_index_buffer(buf.slice(..), wgpu::IndexFormat::Uint32);
                        }
                    }
                    RenderCommand::Draw(vertices) => render_pass.draw(vertices.clone(), 0..1),
                    RenderCommand::DrawIndexed(indices) => render_pass.draw_indexed(indices.clone(), 0, 0..1),
                }
            }
        }

        self.encoder = Some(encoder);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(RenderCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record(RenderCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.record(RenderCommand::SetVertexBuffer(buffer));
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle) {
        self.record(RenderCommand::SetIndexBuffer(buffer));
    }

    fn draw(&mut self, vertices: Range<u32>) {
        self.record(RenderCommand::Draw(vertices));
    }

    fn draw_indexed(&mut self, indices: Range<u32>) {
        self.record(RenderCommand::DrawIndexed(indices));
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buf) = self.buffers.remove(&buffer.0) {
            buf.destroy();
        }
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        self.texture_views.remove(&texture.view.0);
        if let Some(tex) = self.textures.remove(&texture.texture.0) {
            tex.destroy();
            log::trace!("Destroyed texture {}", texture.texture.0);
        }
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }
}

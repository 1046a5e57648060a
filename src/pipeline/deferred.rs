//! Deferred pipeline: geometry pass, lighting passes and forward extras
//!
//! Owns the G-buffer exclusively. The G-buffer follows the size of the
//! output target and is recreated when it changes; if creation fails the
//! pipeline is disabled for the rest of the session.

use super::forward_pass::ForwardPass;
use super::gbuffer::GBuffer;
use super::geometry_pass::GeometryPass;
use super::lighting_pass::{LightKind, LightingPass};
use super::target::RenderTarget;
use super::{uniform_buffer, OBJECT_LAYOUT};
use crate::backend::traits::*;
use crate::diagnostics::WarnOnce;
use crate::ecs::{Camera, CameraUniformData, Stores};
use crate::resources::ResourceCache;
use glam::Vec3;

/// Which forward extras are drawn after lighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardExtras {
    pub skybox: bool,
    pub transparent: bool,
    pub wireframe: bool,
    pub axis: bool,
}

impl Default for ForwardExtras {
    fn default() -> Self {
        Self {
            skybox: true,
            transparent: true,
            wireframe: true,
            axis: false,
        }
    }
}

impl ForwardExtras {
    pub fn none() -> Self {
        Self {
            skybox: false,
            transparent: false,
            wireframe: false,
            axis: false,
        }
    }
}

/// Camera uniform plus the layouts shared by every mesh program
pub(crate) struct SceneBindings {
    pub camera_layout: BindGroupLayoutHandle,
    pub object_layout: BindGroupLayoutHandle,
    pub camera_buffer: BufferHandle,
    pub camera_group: BindGroupHandle,
}

impl SceneBindings {
    fn create(backend: &mut dyn GraphicsBackend) -> BackendResult<Self> {
        let camera_layout = backend.create_bind_group_layout(&[(0, Binding::Uniform)])?;
        let object_layout = backend.create_bind_group_layout(&OBJECT_LAYOUT)?;
        let camera_buffer = uniform_buffer(
            backend,
            "camera uniforms",
            std::mem::size_of::<CameraUniformData>() as u64,
        )?;
        let camera_group =
            backend.create_bind_group(camera_layout, &[(0, BindResource::Buffer(camera_buffer))])?;
        Ok(Self {
            camera_layout,
            object_layout,
            camera_buffer,
            camera_group,
        })
    }

    fn destroy(self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_bind_group(self.camera_group);
        backend.destroy_buffer(self.camera_buffer);
    }
}

pub struct DeferredPipeline {
    gbuffer: Option<GBuffer>,
    bindings: Option<SceneBindings>,
    disabled: bool,
    geometry: GeometryPass,
    lighting: LightingPass,
    forward: ForwardPass,
    extras: ForwardExtras,
    light_order: [LightKind; 3],
    ambient: Vec3,
    clear_color: [f32; 4],
    warnings: WarnOnce,
    vertices_drawn: u64,
}

impl DeferredPipeline {
    pub fn new(extras: ForwardExtras, ambient: Vec3, clear_color: [f32; 4]) -> Self {
        Self {
            gbuffer: None,
            bindings: None,
            disabled: false,
            geometry: GeometryPass::new(),
            lighting: LightingPass::new(),
            forward: ForwardPass::new(),
            extras,
            light_order: LightKind::ALL,
            ambient,
            clear_color,
            warnings: WarnOnce::new(),
            vertices_drawn: 0,
        }
    }

    /// True once a resource failure has disabled the pipeline
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Vertices submitted by the last successful frame
    pub fn vertices_drawn(&self) -> u64 {
        self.vertices_drawn
    }

    pub fn gbuffer(&self) -> Option<&GBuffer> {
        self.gbuffer.as_ref()
    }

    pub fn extras(&self) -> ForwardExtras {
        self.extras
    }

    pub fn set_extras(&mut self, extras: ForwardExtras) {
        self.extras = extras;
    }

    pub fn set_ambient(&mut self, ambient: Vec3) {
        self.ambient = ambient;
    }

    /// Order in which the light types are accumulated
    pub fn set_light_order(&mut self, order: [LightKind; 3]) {
        self.light_order = order;
    }

    pub fn warnings(&self) -> &WarnOnce {
        &self.warnings
    }

    fn ensure_resources(&mut self, backend: &mut dyn GraphicsBackend, width: u32, height: u32) -> bool {
        if self.bindings.is_none() {
            match SceneBindings::create(backend) {
                Ok(bindings) => self.bindings = Some(bindings),
                Err(e) => return self.disable(format!("scene bindings: {e}")),
            }
        }
        if self.gbuffer.map(|g| g.size()) != Some((width, height)) {
            if let Some(old) = self.gbuffer.take() {
                old.destroy(backend);
            }
            match GBuffer::create(backend, width, height) {
                Ok(gbuffer) => self.gbuffer = Some(gbuffer),
                Err(e) => return self.disable(format!("G-buffer {width}x{height}: {e}")),
            }
        }
        true
    }

    fn disable(&mut self, reason: String) -> bool {
        self.disabled = true;
        self.warnings.error("deferred-disabled", || {
            format!("Deferred pipeline disabled for this session: {reason}")
        });
        false
    }

    /// Render the scene into `target`: G-buffer fill, lighting, then forward extras.
    ///
    /// Returns false when nothing was rendered (pipeline disabled or a backend
    /// failure this frame); the frame loop carries on either way.
    pub fn geometry_and_lighting_pass(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        stores: &Stores,
        camera: &Camera,
        target: &RenderTarget,
    ) -> bool {
        if self.disabled {
            return false;
        }
        let (width, height) = target.size();
        if !self.ensure_resources(backend, width, height) {
            return false;
        }

        let Self {
            gbuffer,
            bindings,
            geometry,
            lighting,
            forward,
            extras,
            light_order,
            ambient,
            clear_color,
            warnings,
            ..
        } = self;
        let (Some(gbuffer), Some(bindings)) = (gbuffer.as_ref(), bindings.as_ref()) else {
            return false;
        };

        backend.write_buffer(
            bindings.camera_buffer,
            0,
            bytemuck::bytes_of(&camera.uniform_data()),
        );

        let frame = (|| -> BackendResult<u64> {
            let mut vertices = geometry.render(backend, cache, stores, bindings, gbuffer, warnings)?;
            lighting.render(
                backend,
                cache,
                stores,
                bindings,
                gbuffer,
                target,
                &light_order[..],
                *ambient,
                *clear_color,
                warnings,
            )?;
            // Opaque depth for the forward extras and depth-aware postprocess steps
            backend.copy_texture(gbuffer.depth_texture(), target.depth.texture, width, height);
            vertices += forward.render(backend, cache, stores, bindings, camera, target, extras, warnings)?;
            Ok(vertices)
        })();

        match frame {
            Ok(vertices) => {
                self.vertices_drawn = vertices;
                true
            }
            Err(e) => {
                self.warnings.error(&format!("frame:{e}"), || format!("Deferred frame failed: {e}"));
                false
            }
        }
    }

    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        self.geometry.destroy(backend);
        self.lighting.destroy(backend);
        self.forward.destroy(backend);
        if let Some(gbuffer) = self.gbuffer.take() {
            gbuffer.destroy(backend);
        }
        if let Some(bindings) = self.bindings.take() {
            bindings.destroy(backend);
        }
    }
}

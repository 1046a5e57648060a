//! Lighting passes: fullscreen Blinn-Phong over the G-buffer
//!
//! Each light type is one fullscreen draw over its own light list,
//! accumulated into the output target with additive blending. The sum does
//! not depend on the order of the light types.

use super::deferred::SceneBindings;
use super::gbuffer::GBuffer;
use super::shaders::names;
use super::target::RenderTarget;
use super::{fullscreen_pipeline, linked_program, PipelineCache};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::diagnostics::WarnOnce;
use crate::ecs::{merge, GpuLightData, Stores};
use crate::resources::ResourceCache;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use std::collections::HashMap;

/// Light component type, one lighting draw each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub const ALL: [LightKind; 3] = [LightKind::Directional, LightKind::Point, LightKind::Spot];

    pub fn program(self) -> &'static str {
        match self {
            LightKind::Directional => names::LIGHT_DIRECTIONAL,
            LightKind::Point => names::LIGHT_POINT,
            LightKind::Spot => names::LIGHT_SPOT,
        }
    }

    /// World-space light data from every light of this kind that has a transform
    pub fn gather(self, stores: &Stores) -> Vec<GpuLightData> {
        match self {
            LightKind::Directional => merge(&stores.transforms, &stores.directional_lights)
                .map(|(_, t, light)| light.to_gpu_data(t.forward()))
                .collect(),
            LightKind::Point => merge(&stores.transforms, &stores.point_lights)
                .map(|(_, t, light)| light.to_gpu_data(t.world_position()))
                .collect(),
            LightKind::Spot => merge(&stores.transforms, &stores.spot_lights)
                .map(|(_, t, light)| light.to_gpu_data(t.world_position(), t.forward()))
                .collect(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct LightingHeader {
    ambient: Vec4,
    count: [u32; 4],
}

/// Header + light list buffers of one light kind, and the bind group over them
struct LightBuffers {
    header: BufferHandle,
    lights: BufferHandle,
    capacity: usize,
    bind_group: Option<(BindGroupHandle, [TextureViewHandle; 3])>,
}

impl LightBuffers {
    fn destroy(self, backend: &mut dyn GraphicsBackend) {
        if let Some((group, _)) = self.bind_group {
            backend.destroy_bind_group(group);
        }
        backend.destroy_buffer(self.header);
        backend.destroy_buffer(self.lights);
    }
}

#[derive(Default)]
pub struct LightingPass {
    layout: Option<BindGroupLayoutHandle>,
    pipelines: PipelineCache,
    buffers: HashMap<LightKind, LightBuffers>,
}

impl LightingPass {
    pub fn new() -> Self {
        Self::default()
    }

    fn layout(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<BindGroupLayoutHandle> {
        if let Some(layout) = self.layout {
            return Ok(layout);
        }
        let plane = Binding::Texture { filterable: false };
        let layout = backend.create_bind_group_layout(&[
            (0, Binding::Uniform),
            (1, plane),
            (2, plane),
            (3, plane),
            (4, Binding::Uniform),
            (5, Binding::Storage),
        ])?;
        self.layout = Some(layout);
        Ok(layout)
    }

    /// Upload `lights` for `kind` and return the bind group to draw with
    fn prepare(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        kind: LightKind,
        layout: BindGroupLayoutHandle,
        bindings: &SceneBindings,
        gbuffer: &GBuffer,
        lights: &[GpuLightData],
        ambient: Vec3,
    ) -> BackendResult<BindGroupHandle> {
        let needed = lights.len().max(1);
        if self.buffers.get(&kind).is_some_and(|b| b.capacity < needed) {
            if let Some(old) = self.buffers.remove(&kind) {
                old.destroy(backend);
            }
        }
        if !self.buffers.contains_key(&kind) {
            let header = super::uniform_buffer(
                backend,
                "lighting header",
                std::mem::size_of::<LightingHeader>() as u64,
            )?;
            let capacity = needed.next_power_of_two();
            let light_buffer = backend.create_buffer(
                &format!("{:?} lights", kind),
                BufferKind::Storage,
                (capacity * std::mem::size_of::<GpuLightData>()) as u64,
            )?;
            self.buffers.insert(
                kind,
                LightBuffers {
                    header,
                    lights: light_buffer,
                    capacity,
                    bind_group: None,
                },
            );
        }
        let Some(buffers) = self.buffers.get_mut(&kind) else {
            return Err(BackendError::create(ResourceKind::Buffer, format!("{:?} lights", kind), "not allocated"));
        };

        let header = LightingHeader {
            ambient: if kind == LightKind::Directional {
                ambient.extend(0.0)
            } else {
                Vec4::ZERO
            },
            count: [lights.len() as u32, 0, 0, 0],
        };
        backend.write_buffer(buffers.header, 0, bytemuck::bytes_of(&header));
        if !lights.is_empty() {
            backend.write_buffer(buffers.lights, 0, bytemuck::cast_slice(lights));
        }

        let views = gbuffer.color_views();
        match buffers.bind_group {
            Some((group, bound)) if bound == views => Ok(group),
            stale => {
                if let Some((group, _)) = stale {
                    backend.destroy_bind_group(group);
                }
                let group = backend.create_bind_group(
                    layout,
                    &[
                        (0, BindResource::Buffer(bindings.camera_buffer)),
                        (1, BindResource::Texture(views[0])),
                        (2, BindResource::Texture(views[1])),
                        (3, BindResource::Texture(views[2])),
                        (4, BindResource::Buffer(buffers.header)),
                        (5, BindResource::Buffer(buffers.lights)),
                    ],
                )?;
                buffers.bind_group = Some((group, views));
                Ok(group)
            }
        }
    }

    /// Clear `target` to `clear_color` and accumulate every light kind in `order`.
    ///
    /// Returns the number of lighting draws. Point and spot draws are skipped
    /// when there are no such lights; the directional draw always runs since
    /// it carries the ambient term.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        stores: &Stores,
        bindings: &SceneBindings,
        gbuffer: &GBuffer,
        target: &RenderTarget,
        order: &[LightKind],
        ambient: Vec3,
        clear_color: [f32; 4],
        warnings: &mut WarnOnce,
    ) -> BackendResult<usize> {
        let layout = self.layout(backend)?;

        let mut draws = Vec::with_capacity(order.len());
        for &kind in order {
            let lights = kind.gather(stores);
            if lights.is_empty() && kind != LightKind::Directional {
                continue;
            }
            let Some(program) = linked_program(cache, kind.program(), warnings) else {
                continue;
            };
            let pipeline = self.pipelines.get_or_create(backend, program, |p| {
                fullscreen_pipeline(p, layout, target.format, Blend::Additive)
            })?;
            let group = self.prepare(backend, kind, layout, bindings, gbuffer, &lights, ambient)?;
            draws.push((pipeline, group));
        }

        backend.begin_render_pass(&RenderPassDescriptor::color(
            "Lighting Pass",
            target.color.view,
            LoadOp::Clear(clear_color),
        ));
        for (pipeline, group) in &draws {
            backend.set_render_pipeline(*pipeline);
            backend.set_bind_group(0, *group);
            backend.draw(0..3);
        }
        backend.end_render_pass();
        Ok(draws.len())
    }

    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, buffers) in self.buffers.drain() {
            buffers.destroy(backend);
        }
        self.pipelines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{DirectionalLight, EntityManager, PointLight, Transform};

    #[test]
    fn test_gather_uses_world_transform() {
        let mut entities = EntityManager::new();
        let lamp = entities.create_entity("lamp");
        entities
            .add_component(lamp, Transform::from_position(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        entities
            .add_component(lamp, PointLight::default())
            .unwrap();
        // A light without a transform is not placed in the world
        let sun = entities.create_entity("sun");
        entities
            .add_component(sun, DirectionalLight::default())
            .unwrap();
        crate::systems::transform::propagate(entities.stores_mut());

        let points = LightKind::Point.gather(entities.stores());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].position_radius.truncate(), Vec3::new(1.0, 2.0, 3.0));
        assert!(LightKind::Directional.gather(entities.stores()).is_empty());
    }
}

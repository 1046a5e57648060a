//! Forward extras drawn over the lit image
//!
//! Runs after the G-buffer depth has been copied into the output target, so
//! everything here is depth-tested against the opaque scene:
//! skybox (far plane), transparent meshes back-to-front, wireframe overlay,
//! world axis.

use super::deferred::{ForwardExtras, SceneBindings};
use super::shaders::names;
use super::target::RenderTarget;
use super::{linked_program, mesh_pipeline, resolve_material, ObjectSlots, PipelineCache, TEST_ONLY};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::diagnostics::WarnOnce;
use crate::ecs::{merge, Camera, Stores};
use crate::resources::{ColorVertex, GeometryHandle, ResourceCache, Vertex};
use glam::Vec3;

/// Texture name the skybox samples
pub const SKYBOX_TEXTURE: &str = "skybox";

const AXIS_LENGTH: f32 = 1.0;

struct MeshDraw<'a> {
    geometry: &'a GeometryHandle,
    group: BindGroupHandle,
    distance: f32,
}

#[derive(Default)]
pub struct ForwardPass {
    pipelines: PipelineCache,
    slots: ObjectSlots,
    sky_layout: Option<BindGroupLayoutHandle>,
    sky_sampler: Option<SamplerHandle>,
    sky_group: Option<(BindGroupHandle, TextureViewHandle)>,
    axis_vertices: Option<BufferHandle>,
}

impl ForwardPass {
    pub fn new() -> Self {
        Self::default()
    }

    fn sky_group(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        view: TextureViewHandle,
    ) -> BackendResult<(BindGroupLayoutHandle, BindGroupHandle)> {
        let layout = match self.sky_layout {
            Some(layout) => layout,
            None => {
                let layout = backend
                    .create_bind_group_layout(&[(0, Binding::Texture { filterable: true }), (1, Binding::Sampler)])?;
                self.sky_layout = Some(layout);
                layout
            }
        };
        let sampler = match self.sky_sampler {
            Some(sampler) => sampler,
            None => {
                let sampler = backend.create_sampler("skybox sampler", Wrap::Repeat)?;
                self.sky_sampler = Some(sampler);
                sampler
            }
        };
        match self.sky_group {
            Some((group, bound)) if bound == view => Ok((layout, group)),
            stale => {
                if let Some((group, _)) = stale {
                    backend.destroy_bind_group(group);
                }
                let group = backend.create_bind_group(
                    layout,
                    &[
                        (0, BindResource::Texture(view)),
                        (1, BindResource::Sampler(sampler)),
                    ],
                )?;
                self.sky_group = Some((group, view));
                Ok((layout, group))
            }
        }
    }

    fn axis_vertices(&mut self, backend: &mut dyn GraphicsBackend) -> BackendResult<BufferHandle> {
        if let Some(buffer) = self.axis_vertices {
            return Ok(buffer);
        }
        let lines: Vec<ColorVertex> = [Vec3::X, Vec3::Y, Vec3::Z]
            .into_iter()
            .flat_map(|axis| {
                [
                    ColorVertex {
                        position: Vec3::ZERO,
                        color: axis,
                    },
                    ColorVertex {
                        position: axis * AXIS_LENGTH,
                        color: axis,
                    },
                ]
            })
            .collect();
        let buffer = backend.create_buffer_init("axis vertices", BufferKind::Vertex, bytemuck::cast_slice(&lines))?;
        self.axis_vertices = Some(buffer);
        Ok(buffer)
    }

    /// Draw the enabled extras into `target`; returns the number of vertices submitted
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        stores: &Stores,
        bindings: &SceneBindings,
        camera: &Camera,
        target: &RenderTarget,
        extras: &ForwardExtras,
        warnings: &mut WarnOnce,
    ) -> BackendResult<u64> {
        let formats = [target.format];
        let mesh_layouts = vec![bindings.camera_layout, bindings.object_layout];

        let mut skybox = None;
        if extras.skybox {
            match cache.texture_by_name(SKYBOX_TEXTURE) {
                Some(texture) => {
                    if let Some(program) = linked_program(cache, names::SKYBOX, warnings) {
                        let (sky_layout, group) = self.sky_group(backend, texture.gpu.view)?;
                        let pipeline = self.pipelines.get_or_create(backend, program, |p| {
                            mesh_pipeline(
                                p,
                                vec![bindings.camera_layout, sky_layout],
                                None,
                                Topology::Triangles,
                                &formats,
                                Blend::Replace,
                                TEST_ONLY,
                            )
                        })?;
                        skybox = Some((pipeline, group));
                    }
                }
                None => {
                    warnings.warn("texture:skybox", || {
                        format!("Texture '{}' not found, skipping the skybox", SKYBOX_TEXTURE)
                    });
                }
            }
        }

        let mut slot = 0usize;
        let mut transparent = Vec::new();
        let mut transparent_pipeline = None;
        if extras.transparent {
            for (_, transform, mesh) in merge(&stores.transforms, &stores.meshes) {
                if !mesh.visible {
                    continue;
                }
                let material = resolve_material(cache, mesh.material, warnings);
                if !material.is_transparent() {
                    continue;
                }
                let Some(geometry) = cache.mesh(mesh.mesh) else {
                    continue;
                };
                let group = self.slots.write(
                    backend,
                    bindings.object_layout,
                    slot,
                    &transform.uniform_data(),
                    &material.uniform_data(),
                )?;
                slot += 1;
                transparent.push(MeshDraw {
                    geometry,
                    group,
                    distance: mesh.world_bounds().centre.distance(camera.position()),
                });
            }
            // Farthest first
            transparent.sort_by(|a, b| b.distance.total_cmp(&a.distance));
            if !transparent.is_empty() {
                if let Some(program) = linked_program(cache, names::TRANSPARENT, warnings) {
                    transparent_pipeline = Some(self.pipelines.get_or_create(backend, program, |p| {
                        mesh_pipeline(
                            p,
                            mesh_layouts.clone(),
                            Some(Vertex::layout()),
                            Topology::Triangles,
                            &formats,
                            Blend::Alpha,
                            TEST_ONLY,
                        )
                    })?);
                }
            }
        }

        let mut wireframe = Vec::new();
        let mut wireframe_pipeline = None;
        if extras.wireframe {
            for (_, transform, mesh) in merge(&stores.transforms, &stores.meshes) {
                if !mesh.visible || !mesh.render_wireframe {
                    continue;
                }
                let Some(geometry) = cache.mesh(mesh.mesh) else {
                    continue;
                };
                let material = resolve_material(cache, mesh.material, warnings);
                let group = self.slots.write(
                    backend,
                    bindings.object_layout,
                    slot,
                    &transform.uniform_data(),
                    &material.uniform_data(),
                )?;
                slot += 1;
                wireframe.push(MeshDraw {
                    geometry,
                    group,
                    distance: 0.0,
                });
            }
            if !wireframe.is_empty() {
                if let Some(program) = linked_program(cache, names::WIREFRAME, warnings) {
                    wireframe_pipeline = Some(self.pipelines.get_or_create(backend, program, |p| {
                        mesh_pipeline(
                            p,
                            mesh_layouts.clone(),
                            Some(Vertex::layout()),
                            Topology::Lines,
                            &formats,
                            Blend::Replace,
                            TEST_ONLY,
                        )
                    })?);
                }
            }
        }

        let mut axis = None;
        if extras.axis {
            if let Some(program) = linked_program(cache, names::AXIS, warnings) {
                let pipeline = self.pipelines.get_or_create(backend, program, |p| {
                    mesh_pipeline(
                        p,
                        vec![bindings.camera_layout],
                        Some(ColorVertex::layout()),
                        Topology::Lines,
                        &formats,
                        Blend::Replace,
                        TEST_ONLY,
                    )
                })?;
                axis = Some((pipeline, self.axis_vertices(backend)?));
            }
        }

        let has_transparent = transparent_pipeline.is_some();
        let has_wireframe = wireframe_pipeline.is_some();
        if skybox.is_none() && !has_transparent && !has_wireframe && axis.is_none() {
            return Ok(0);
        }

        backend.begin_render_pass(
            &RenderPassDescriptor::color("Forward Pass", target.color.view, LoadOp::Load)
                .with_depth(target.depth.view, LoadOp::Load),
        );
        backend.set_bind_group(0, bindings.camera_group);

        let mut vertices = 0u64;
        if let Some((pipeline, group)) = skybox {
            backend.set_render_pipeline(pipeline);
            backend.set_bind_group(1, group);
            backend.draw(0..3);
            vertices += 3;
        }
        if let Some(pipeline) = transparent_pipeline {
            backend.set_render_pipeline(pipeline);
            for draw in &transparent {
                backend.set_bind_group(1, draw.group);
                backend.set_vertex_buffer(draw.geometry.vertex_buffer);
                backend.set_index_buffer(draw.geometry.index_buffer);
                backend.draw_indexed(0..draw.geometry.index_count);
                vertices += draw.geometry.index_count as u64;
            }
        }
        if let Some(pipeline) = wireframe_pipeline {
            backend.set_render_pipeline(pipeline);
            for draw in &wireframe {
                backend.set_bind_group(1, draw.group);
                backend.set_vertex_buffer(draw.geometry.vertex_buffer);
                backend.set_index_buffer(draw.geometry.edge_buffer);
                backend.draw_indexed(0..draw.geometry.edge_count);
                vertices += draw.geometry.edge_count as u64;
            }
        }
        if let Some((pipeline, buffer)) = axis {
            backend.set_render_pipeline(pipeline);
            backend.set_vertex_buffer(buffer);
            backend.draw(0..6);
            vertices += 6;
        }
        backend.end_render_pass();

        Ok(vertices)
    }

    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        self.slots.destroy(backend);
        if let Some((group, _)) = self.sky_group.take() {
            backend.destroy_bind_group(group);
        }
        if let Some(buffer) = self.axis_vertices.take() {
            backend.destroy_buffer(buffer);
        }
        self.pipelines.clear();
    }
}

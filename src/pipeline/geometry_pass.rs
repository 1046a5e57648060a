//! Geometry pass: opaque visible meshes into the G-buffer
//!
//! Draw order is the store order (ascending entity id); the depth test
//! resolves overlap, so no sorting is needed.

use super::deferred::SceneBindings;
use super::gbuffer::{GBuffer, GBUFFER_FORMATS};
use super::shaders::names;
use super::{linked_program, mesh_pipeline, resolve_material, ObjectSlots, PipelineCache};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::diagnostics::WarnOnce;
use crate::ecs::{merge, Stores};
use crate::resources::{ResourceCache, Vertex};

#[derive(Default)]
pub struct GeometryPass {
    pipelines: PipelineCache,
    slots: ObjectSlots,
}

impl GeometryPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the G-buffer; returns the number of vertices submitted.
    ///
    /// Without a usable program the G-buffer is still cleared, so lighting
    /// sees an empty scene instead of last frame's data.
    pub(crate) fn render(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        cache: &dyn ResourceCache,
        stores: &Stores,
        bindings: &SceneBindings,
        gbuffer: &GBuffer,
        warnings: &mut WarnOnce,
    ) -> BackendResult<u64> {
        let Some(program) = linked_program(cache, names::GBUFFER, warnings) else {
            backend.begin_render_pass(&gbuffer.pass_descriptor());
            backend.end_render_pass();
            return Ok(0);
        };
        let pipeline = self.pipelines.get_or_create(backend, program, |p| {
            mesh_pipeline(
                p,
                vec![bindings.camera_layout, bindings.object_layout],
                Some(Vertex::layout()),
                Topology::Triangles,
                &GBUFFER_FORMATS,
                Blend::Replace,
                DepthTest {
                    write: true,
                    compare: DepthCompare::Less,
                },
            )
        })?;

        let mut draws = Vec::new();
        for (entity, transform, mesh) in merge(&stores.transforms, &stores.meshes) {
            if !mesh.visible {
                continue;
            }
            let material = resolve_material(cache, mesh.material, warnings);
            if material.is_transparent() {
                continue;
            }
            let Some(geometry) = cache.mesh(mesh.mesh) else {
                warnings.warn(&format!("mesh:{}", mesh.mesh.index()), || {
                    format!("Mesh {} of entity {} not found", mesh.mesh.index(), entity)
                });
                continue;
            };
            let group = self.slots.write(
                backend,
                bindings.object_layout,
                draws.len(),
                &transform.uniform_data(),
                &material.uniform_data(),
            )?;
            draws.push((geometry, group));
        }

        backend.begin_render_pass(&gbuffer.pass_descriptor());
        backend.set_render_pipeline(pipeline);
        backend.set_bind_group(0, bindings.camera_group);
        let mut vertices = 0u64;
        for (geometry, group) in &draws {
            backend.set_bind_group(1, *group);
            backend.set_vertex_buffer(geometry.vertex_buffer);
            backend.set_index_buffer(geometry.index_buffer);
            backend.draw_indexed(0..geometry.index_count);
            vertices += geometry.index_count as u64;
        }
        backend.end_render_pass();

        log::trace!("Geometry pass: {} meshes, {} vertices", draws.len(), vertices);
        Ok(vertices)
    }

    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        self.slots.destroy(backend);
        self.pipelines.clear();
    }
}

//! Render pipeline
//!
//! Per frame the passes run in a fixed order:
//! 1. Geometry pass - opaque meshes into the G-buffer
//! 2. Lighting passes - directional, point and spot lights accumulated additively
//! 3. Forward extras - skybox, transparent meshes, wireframe overlay, debug axis
//! 4. Postprocess chains - ping-ponged fullscreen steps, ending at the display

pub mod deferred;
pub mod forward_pass;
pub mod gbuffer;
pub mod geometry_pass;
pub mod lighting_pass;
pub mod postprocess;
pub mod shaders;
pub mod target;

pub use deferred::{DeferredPipeline, ForwardExtras};
pub use gbuffer::GBuffer;
pub use lighting_pass::LightKind;
pub use postprocess::{
    BlendMode, ChainTarget, PingPong, PostprocessChain, PostprocessConfig, PostprocessStep,
    StepRecord,
};
pub use target::RenderTarget;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::diagnostics::WarnOnce;
use crate::ecs::TransformUniformData;
use crate::resources::{Material, MaterialId, MaterialUniformData, ResourceCache, ShaderProgram};
use glam::Vec4;
use std::collections::HashMap;

static FALLBACK_MATERIAL: Material = Material {
    name: String::new(),
    base_color: Vec4::ONE,
    specular: 0.5,
};

/// Material of a mesh, or a white fallback when the id is unknown
pub(crate) fn resolve_material<'a>(
    cache: &'a dyn ResourceCache,
    id: MaterialId,
    warnings: &mut WarnOnce,
) -> &'a Material {
    match cache.material(id) {
        Some(material) => material,
        None => {
            warnings.warn(&format!("material:{}", id.index()), || {
                format!("Material {} not found, using the fallback", id.index())
            });
            &FALLBACK_MATERIAL
        }
    }
}

/// Look up a program, reporting a missing or unlinked one once per name.
pub(crate) fn linked_program<'a>(
    cache: &'a dyn ResourceCache,
    name: &str,
    warnings: &mut WarnOnce,
) -> Option<&'a ShaderProgram> {
    match cache.shader_by_name(name) {
        Some(program) if program.is_linked() => Some(program),
        Some(program) => {
            warnings.warn(&format!("unlinked:{name}"), || {
                format!(
                    "Shader '{}' is not linked, skipping its draw: {}",
                    name,
                    program.log().unwrap_or("unknown error")
                )
            });
            None
        }
        None => {
            warnings.warn(&format!("missing:{name}"), || {
                format!("Shader '{}' not found, skipping its draw", name)
            });
            None
        }
    }
}

/// Render pipelines keyed by program name, rebuilt when the program is re-registered
#[derive(Default)]
pub(crate) struct PipelineCache {
    pipelines: HashMap<String, (u64, RenderPipelineHandle)>,
}

impl PipelineCache {
    pub fn get_or_create(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        program: &ShaderProgram,
        describe: impl FnOnce(&ShaderProgram) -> PipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        if let Some(&(revision, pipeline)) = self.pipelines.get(program.name()) {
            if revision == program.revision() {
                return Ok(pipeline);
            }
        }
        let pipeline = backend.create_render_pipeline(&describe(program))?;
        self.pipelines
            .insert(program.name().to_string(), (program.revision(), pipeline));
        Ok(pipeline)
    }

    pub fn clear(&mut self) {
        self.pipelines.clear();
    }
}

/// Fullscreen-triangle pipeline with a single colour target
pub(crate) fn fullscreen_pipeline(
    program: &ShaderProgram,
    layout: BindGroupLayoutHandle,
    format: TextureFormat,
    blend: Blend,
) -> PipelineDescriptor {
    PipelineDescriptor {
        label: program.name().to_string(),
        wgsl: program.source().to_string(),
        vertex_layout: None,
        bind_layouts: vec![layout],
        topology: Topology::Triangles,
        depth: None,
        targets: vec![(format, blend)],
    }
}

/// Depth-tested pipeline writing every format in `color_formats` with the same blend
pub(crate) fn mesh_pipeline(
    program: &ShaderProgram,
    bind_layouts: Vec<BindGroupLayoutHandle>,
    vertex_layout: Option<VertexLayout>,
    topology: Topology,
    color_formats: &[TextureFormat],
    blend: Blend,
    depth: DepthTest,
) -> PipelineDescriptor {
    PipelineDescriptor {
        label: program.name().to_string(),
        wgsl: program.source().to_string(),
        vertex_layout,
        bind_layouts,
        topology,
        depth: Some(depth),
        targets: color_formats.iter().map(|&format| (format, blend)).collect(),
    }
}

/// Depth test of the forward extras: against the opaque scene, without writing
pub(crate) const TEST_ONLY: DepthTest = DepthTest {
    write: false,
    compare: DepthCompare::LessEqual,
};

pub(crate) fn uniform_buffer(
    backend: &mut dyn GraphicsBackend,
    label: &str,
    size: u64,
) -> BackendResult<BufferHandle> {
    backend.create_buffer(label, BufferKind::Uniform, size)
}

/// Layout of group 1 for per-object mesh programs
pub(crate) const OBJECT_LAYOUT: [(u32, Binding); 2] = [(0, Binding::Uniform), (1, Binding::Uniform)];

// Uniform offsets must be 256-byte aligned
const OBJECT_OFFSET: u64 = 0;
const MATERIAL_OFFSET: u64 = 256;
const OBJECT_SLOT_SIZE: u64 = 512;

/// Grow-only pool of per-draw object + material uniforms.
///
/// Each draw in a frame gets its own slot: buffer writes land before the
/// frame's commands execute, so a shared buffer would leave every draw with
/// the last object's data.
#[derive(Default)]
pub(crate) struct ObjectSlots {
    slots: Vec<(BufferHandle, BindGroupHandle)>,
}

impl ObjectSlots {
    pub fn write(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        layout: BindGroupLayoutHandle,
        index: usize,
        object: &TransformUniformData,
        material: &MaterialUniformData,
    ) -> BackendResult<BindGroupHandle> {
        while self.slots.len() <= index {
            let buffer = uniform_buffer(backend, "object slot", OBJECT_SLOT_SIZE)?;
            let bind_group = backend.create_bind_group(
                layout,
                &[
                    (
                        0,
                        BindResource::BufferSlice {
                            buffer,
                            offset: OBJECT_OFFSET,
                            size: std::mem::size_of::<TransformUniformData>() as u64,
                        },
                    ),
                    (
                        1,
                        BindResource::BufferSlice {
                            buffer,
                            offset: MATERIAL_OFFSET,
                            size: std::mem::size_of::<MaterialUniformData>() as u64,
                        },
                    ),
                ],
            )?;
            self.slots.push((buffer, bind_group));
        }
        let (buffer, bind_group) = self.slots[index];
        backend.write_buffer(buffer, OBJECT_OFFSET, bytemuck::bytes_of(object));
        backend.write_buffer(buffer, MATERIAL_OFFSET, bytemuck::bytes_of(material));
        Ok(bind_group)
    }

    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        for (buffer, bind_group) in self.slots.drain(..) {
            backend.destroy_bind_group(bind_group);
            backend.destroy_buffer(buffer);
        }
    }
}

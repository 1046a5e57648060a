//! Resource cache passed to the renderer as an explicit context
//!
//! The renderer only ever looks resources up through [`ResourceCache`], so
//! tests can hand it a library with a subset of programs (or broken ones).

use super::material::{Material, MaterialId};
use super::mesh::{GeometryHandle, Mesh, MeshId};
use super::shader::{ShaderKind, ShaderProgram};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::shaders::{self, names};
use std::collections::HashMap;

/// An image uploaded to the GPU
#[derive(Debug, Clone, Copy)]
pub struct ImageTexture {
    pub gpu: GpuTexture,
    pub width: u32,
    pub height: u32,
}

/// Read-only lookups used by the render passes
pub trait ResourceCache {
    fn shader_by_name(&self, name: &str) -> Option<&ShaderProgram>;

    fn mesh_by_name(&self, name: &str) -> Option<MeshId>;

    fn mesh(&self, id: MeshId) -> Option<&GeometryHandle>;

    fn texture_by_name(&self, name: &str) -> Option<&ImageTexture>;

    fn material(&self, id: MaterialId) -> Option<&Material>;
}

/// Built-in programs and the prelude each body is compiled with
pub const BUILTIN_SHADERS: &[(&str, ShaderKind, &str)] = &[
    (names::GBUFFER, ShaderKind::Surface, shaders::GBUFFER_FRAGMENT),
    (names::TRANSPARENT, ShaderKind::Surface, shaders::TRANSPARENT_FRAGMENT),
    (names::WIREFRAME, ShaderKind::Surface, shaders::WIREFRAME_FRAGMENT),
    (names::SKYBOX, ShaderKind::Camera, shaders::SKYBOX),
    (names::AXIS, ShaderKind::Camera, shaders::AXIS),
    (names::LIGHT_DIRECTIONAL, ShaderKind::Lighting, shaders::LIGHT_DIRECTIONAL),
    (names::LIGHT_POINT, ShaderKind::Lighting, shaders::LIGHT_POINT),
    (names::LIGHT_SPOT, ShaderKind::Lighting, shaders::LIGHT_SPOT),
    (names::PASSTHROUGH, ShaderKind::Postprocess, shaders::PASSTHROUGH),
    (names::GRAYSCALE, ShaderKind::Postprocess, shaders::GRAYSCALE),
    (names::BLUR, ShaderKind::Postprocess, shaders::BLUR),
    (names::VIGNETTE, ShaderKind::Postprocess, shaders::VIGNETTE),
    (names::FOG, ShaderKind::Postprocess, shaders::FOG),
    (names::BLEND, ShaderKind::Postprocess, shaders::BLEND),
];

/// Owned meshes, materials, textures and shader programs
#[derive(Default)]
pub struct ResourceLibrary {
    shaders: HashMap<String, ShaderProgram>,
    meshes: Vec<GeometryHandle>,
    mesh_names: HashMap<String, MeshId>,
    materials: Vec<Material>,
    material_names: HashMap<String, MaterialId>,
    textures: HashMap<String, ImageTexture>,
    next_revision: u64,
}

impl ResourceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with every built-in program registered
    pub fn with_builtin_shaders() -> Self {
        let mut library = Self::new();
        for (name, kind, body) in BUILTIN_SHADERS {
            library.register_shader(name, *kind, body);
        }
        library
    }

    /// Compile and register a program, replacing any program of that name.
    /// Returns whether it linked; an unlinked program stays registered.
    pub fn register_shader(&mut self, name: &str, kind: ShaderKind, body: &str) -> bool {
        self.next_revision += 1;
        let program = ShaderProgram::compile(name, kind, body, self.next_revision);
        let linked = program.is_linked();
        if let Some(message) = program.log() {
            log::warn!("Shader '{}' failed to link: {}", name, message);
        } else {
            log::debug!("Registered shader '{}' ({:?})", name, kind);
        }
        self.shaders.insert(name.to_string(), program);
        linked
    }

    pub fn remove_shader(&mut self, name: &str) -> Option<ShaderProgram> {
        self.shaders.remove(name)
    }

    pub fn shader_names(&self) -> impl Iterator<Item = &str> {
        self.shaders.keys().map(String::as_str)
    }

    /// Upload `mesh` under `name`; a mesh of the same name is replaced in place
    pub fn add_mesh(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: &str,
        mesh: &Mesh,
    ) -> BackendResult<MeshId> {
        let handle = GeometryHandle::upload(backend, mesh)?;
        if let Some(&id) = self.mesh_names.get(name) {
            self.meshes[id.index()].destroy(backend);
            self.meshes[id.index()] = handle;
            return Ok(id);
        }
        let id = MeshId(self.meshes.len() as u32);
        self.meshes.push(handle);
        self.mesh_names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Register a material under its name; a material of the same name is replaced
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        if let Some(&id) = self.material_names.get(&material.name) {
            self.materials[id.index()] = material;
            return id;
        }
        let id = MaterialId(self.materials.len() as u32);
        self.material_names.insert(material.name.clone(), id);
        self.materials.push(material);
        id
    }

    pub fn material_by_name(&self, name: &str) -> Option<MaterialId> {
        self.material_names.get(name).copied()
    }

    /// Upload tightly packed RGBA8 pixels as a sampled texture
    pub fn add_texture(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        name: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> BackendResult<ImageTexture> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(BackendError::create(
                ResourceKind::Texture,
                name,
                format!("expected {} bytes of RGBA8, got {}", expected, rgba.len()),
            ));
        }
        let gpu = backend.create_texture(&TextureDescriptor::new(
            name,
            width,
            height,
            TextureFormat::Rgba8UnormSrgb,
            TextureRole::Upload,
        ))?;
        backend.write_texture(gpu.texture, rgba, width, height);
        let image = ImageTexture { gpu, width, height };
        if let Some(old) = self.textures.insert(name.to_string(), image) {
            backend.destroy_texture(old.gpu);
        }
        Ok(image)
    }

    /// Release every GPU resource owned by the library
    pub fn destroy(&mut self, backend: &mut dyn GraphicsBackend) {
        for mesh in self.meshes.drain(..) {
            mesh.destroy(backend);
        }
        self.mesh_names.clear();
        for (_, image) in self.textures.drain() {
            backend.destroy_texture(image.gpu);
        }
    }
}

impl ResourceCache for ResourceLibrary {
    fn shader_by_name(&self, name: &str) -> Option<&ShaderProgram> {
        self.shaders.get(name)
    }

    fn mesh_by_name(&self, name: &str) -> Option<MeshId> {
        self.mesh_names.get(name).copied()
    }

    fn mesh(&self, id: MeshId) -> Option<&GeometryHandle> {
        self.meshes.get(id.index())
    }

    fn texture_by_name(&self, name: &str) -> Option<&ImageTexture> {
        self.textures.get(name)
    }

    fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;

    #[test]
    fn test_builtin_shaders_all_link() {
        let library = ResourceLibrary::with_builtin_shaders();
        for (name, _, _) in BUILTIN_SHADERS {
            let program = library.shader_by_name(name).unwrap();
            assert!(program.is_linked(), "{}: {:?}", name, program.log());
        }
    }

    #[test]
    fn test_reregistering_bumps_revision() {
        let mut library = ResourceLibrary::with_builtin_shaders();
        let before = library.shader_by_name(names::BLUR).unwrap().revision();
        library.register_shader(names::BLUR, ShaderKind::Postprocess, shaders::BLUR);
        assert!(library.shader_by_name(names::BLUR).unwrap().revision() > before);
    }

    #[test]
    fn test_mesh_replaced_in_place() {
        let mut backend = RecordingBackend::new(8, 8);
        let mut library = ResourceLibrary::new();
        let a = library.add_mesh(&mut backend, "shape", &Mesh::cube()).unwrap();
        let b = library
            .add_mesh(&mut backend, "shape", &Mesh::sphere(8, 4))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(library.mesh_by_name("shape"), Some(a));
        assert_eq!(library.mesh(a).unwrap().name, "sphere");
        assert_eq!(backend.live_buffers(), 3);
    }

    #[test]
    fn test_texture_size_mismatch_rejected() {
        let mut backend = RecordingBackend::new(8, 8);
        let mut library = ResourceLibrary::new();
        assert!(library
            .add_texture(&mut backend, "skybox", 2, 2, &[0u8; 8])
            .is_err());
        assert!(library.texture_by_name("skybox").is_none());
    }
}

//! Resource management
//!
//! Meshes, materials, textures and shader programs, looked up by the
//! renderer through the [`ResourceCache`] trait.

mod cache;
mod material;
mod mesh;
mod shader;

pub use cache::*;
pub use material::*;
pub use mesh::*;
pub use shader::*;

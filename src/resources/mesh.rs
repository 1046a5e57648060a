//! Mesh data structures, generation and GPU upload

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::ecs::BoundingSphere;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};
use std::collections::BTreeSet;

/// Index of an uploaded mesh in the resource library
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(pub(crate) u32);

impl MeshId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Mesh vertex with position, normal, UV, and tangent
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec4,
}

impl Vertex {
    pub fn layout() -> VertexLayout {
        use VertexFormat::*;
        VertexLayout::packed(&[Float32x3, Float32x3, Float32x2, Float32x4])
    }
}

/// Position + color vertex for debug lines
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl ColorVertex {
    pub fn layout() -> VertexLayout {
        VertexLayout::packed(&[VertexFormat::Float32x3, VertexFormat::Float32x3])
    }
}

/// A mesh with vertex and index data
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub name: String,
}

impl Mesh {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Unique triangle edges as a line list, each edge once
    pub fn edges(&self) -> Vec<u32> {
        let mut unique = BTreeSet::new();
        for tri in self.indices.chunks_exact(3) {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                unique.insert((a.min(b), a.max(b)));
            }
        }
        unique.into_iter().flat_map(|(a, b)| [a, b]).collect()
    }

    /// Local-space bounding sphere of all vertices
    pub fn bounds(&self) -> BoundingSphere {
        BoundingSphere::from_points(self.vertices.iter().map(|v| v.position))
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let mut mesh = Mesh::new("cube");

        // (position, normal, uv) per face corner
        let corners = [
            // Front
            (Vec3::new(-0.5, -0.5, 0.5), Vec3::Z, Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, 0.5), Vec3::Z, Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, 0.5), Vec3::Z, Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, 0.5), Vec3::Z, Vec2::new(0.0, 0.0)),
            // Back
            (Vec3::new(0.5, -0.5, -0.5), -Vec3::Z, Vec2::new(0.0, 1.0)),
            (Vec3::new(-0.5, -0.5, -0.5), -Vec3::Z, Vec2::new(1.0, 1.0)),
            (Vec3::new(-0.5, 0.5, -0.5), -Vec3::Z, Vec2::new(1.0, 0.0)),
            (Vec3::new(0.5, 0.5, -0.5), -Vec3::Z, Vec2::new(0.0, 0.0)),
            // Right
            (Vec3::new(0.5, -0.5, 0.5), Vec3::X, Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, -0.5), Vec3::X, Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, -0.5), Vec3::X, Vec2::new(1.0, 0.0)),
            (Vec3::new(0.5, 0.5, 0.5), Vec3::X, Vec2::new(0.0, 0.0)),
            // Left
            (Vec3::new(-0.5, -0.5, -0.5), -Vec3::X, Vec2::new(0.0, 1.0)),
            (Vec3::new(-0.5, -0.5, 0.5), -Vec3::X, Vec2::new(1.0, 1.0)),
            (Vec3::new(-0.5, 0.5, 0.5), -Vec3::X, Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, -0.5), -Vec3::X, Vec2::new(0.0, 0.0)),
            // Top
            (Vec3::new(-0.5, 0.5, 0.5), Vec3::Y, Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, 0.5, 0.5), Vec3::Y, Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, 0.5, -0.5), Vec3::Y, Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, 0.5, -0.5), Vec3::Y, Vec2::new(0.0, 0.0)),
            // Bottom
            (Vec3::new(-0.5, -0.5, -0.5), -Vec3::Y, Vec2::new(0.0, 1.0)),
            (Vec3::new(0.5, -0.5, -0.5), -Vec3::Y, Vec2::new(1.0, 1.0)),
            (Vec3::new(0.5, -0.5, 0.5), -Vec3::Y, Vec2::new(1.0, 0.0)),
            (Vec3::new(-0.5, -0.5, 0.5), -Vec3::Y, Vec2::new(0.0, 0.0)),
        ];

        for (position, normal, uv) in corners {
            let tangent = if normal.abs().y > 0.9 {
                Vec4::new(1.0, 0.0, 0.0, 1.0)
            } else {
                Vec3::Y.cross(normal).normalize().extend(1.0)
            };
            mesh.vertices.push(Vertex {
                position,
                normal,
                uv,
                tangent,
            });
        }

        for face in 0..6 {
            let base = face * 4;
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// Create a UV sphere of diameter 1
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let mut mesh = Mesh::new("sphere");
        let segments = segments.max(3);
        let rings = rings.max(2);

        let segment_angle = std::f32::consts::TAU / segments as f32;
        let ring_angle = std::f32::consts::PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();

                mesh.vertices.push(Vertex {
                    position: Vec3::new(x, y, z) * 0.5,
                    normal: Vec3::new(x, y, z).normalize_or_zero(),
                    uv: Vec2::new(segment as f32 / segments as f32, ring as f32 / rings as f32),
                    tangent: Vec4::new(-theta.sin(), 0.0, theta.cos(), 1.0),
                });
            }
        }

        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }

    /// Create a plane on the XZ axis
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = Mesh::new("plane");
        let subdivisions = subdivisions.max(1);

        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                mesh.vertices.push(Vertex {
                    position: Vec3::new(
                        -width / 2.0 + x as f32 * step_x,
                        0.0,
                        -depth / 2.0 + z as f32 * step_z,
                    ),
                    normal: Vec3::Y,
                    uv: Vec2::new(
                        x as f32 / subdivisions as f32,
                        z as f32 / subdivisions as f32,
                    ),
                    tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
                });
            }
        }

        for z in 0..subdivisions {
            for x in 0..subdivisions {
                let current = z * (subdivisions + 1) + x;
                let next = current + subdivisions + 1;
                mesh.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }

        mesh
    }
}

/// GPU buffers of an uploaded mesh
#[derive(Debug, Clone)]
pub struct GeometryHandle {
    pub name: String,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub edge_buffer: BufferHandle,
    pub vertex_count: u32,
    pub index_count: u32,
    pub edge_count: u32,
    pub bounds: BoundingSphere,
}

impl GeometryHandle {
    /// Upload vertices, triangle indices and wireframe edges
    pub fn upload(backend: &mut dyn GraphicsBackend, mesh: &Mesh) -> BackendResult<Self> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(BackendError::create(ResourceKind::Buffer, &mesh.name, "mesh has no geometry"));
        }
        let edges = mesh.edges();

        let vertex_buffer = backend.create_buffer_init(
            &format!("{} vertices", mesh.name),
            BufferKind::Vertex,
            bytemuck::cast_slice(&mesh.vertices),
        )?;
        let index_buffer = backend.create_buffer_init(
            &format!("{} indices", mesh.name),
            BufferKind::Index,
            bytemuck::cast_slice(&mesh.indices),
        )?;
        let edge_buffer = backend.create_buffer_init(
            &format!("{} edges", mesh.name),
            BufferKind::Index,
            bytemuck::cast_slice(&edges),
        )?;

        log::debug!(
            "Uploaded mesh '{}': {} vertices, {} triangles, {} edges",
            mesh.name,
            mesh.vertex_count(),
            mesh.triangle_count(),
            edges.len() / 2
        );

        Ok(Self {
            name: mesh.name.clone(),
            vertex_buffer,
            index_buffer,
            edge_buffer,
            vertex_count: mesh.vertex_count() as u32,
            index_count: mesh.index_count() as u32,
            edge_count: edges.len() as u32,
            bounds: mesh.bounds(),
        })
    }

    pub fn destroy(&self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.index_buffer);
        backend.destroy_buffer(self.edge_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_edges_are_unique() {
        let cube = Mesh::cube();
        let edges = cube.edges();
        // 6 faces x (4 border + 1 diagonal)
        assert_eq!(edges.len(), 30 * 2);
        let pairs: BTreeSet<_> = edges.chunks_exact(2).map(|e| (e[0], e[1])).collect();
        assert_eq!(pairs.len(), 30);
    }

    #[test]
    fn test_sphere_bounds() {
        let sphere = Mesh::sphere(16, 8);
        let bounds = sphere.bounds();
        assert!(bounds.centre.length() < 1e-3);
        // Box-derived sphere encloses the unit-diameter ball
        assert!(bounds.radius >= 0.5);
        assert!(bounds.radius < 0.9);
    }

    #[test]
    fn test_plane_counts() {
        let plane = Mesh::plane(2.0, 2.0, 2);
        assert_eq!(plane.vertex_count(), 9);
        assert_eq!(plane.triangle_count(), 8);
    }

    #[test]
    fn test_vertex_layouts_match_structs() {
        assert_eq!(Vertex::layout().stride(), std::mem::size_of::<Vertex>() as u64);
        assert_eq!(ColorVertex::layout().stride(), std::mem::size_of::<ColorVertex>() as u64);
        assert_eq!(Vertex::layout().attributes()[3].2, 32);
    }
}

//! Mesh geometry and its backend-resident counterpart
//!
//! [`Mesh`] is plain CPU data. [`Mesh::upload`] turns it into a [`GpuMesh`]
//! holding one buffer per vertex attribute (plus an optional vertex array),
//! which the shadow and lighting passes bind either through the vertex array
//! or attribute by attribute when vertex arrays are unavailable.

use bytemuck::{Pod, Zeroable};

use crate::render::api::{BufferId, SharedBackend, VertexArrayId};
use crate::render::{RenderError, RenderResult};

/// Vertex with position, normal, texture coordinate and tangent
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],

    /// Unit normal
    pub normal: [f32; 3],

    /// Texture coordinates
    pub tex_coord: [f32; 2],

    /// Tangent with handedness in `w`
    pub tangent: [f32; 4],
}

impl Vertex {
    /// Create a vertex without tangent data
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self { position, normal, tex_coord, tangent: [0.0; 4] }
    }

    /// Create a vertex with a tangent
    pub fn with_tangent(mut self, tangent: [f32; 4]) -> Self {
        self.tangent = tangent;
        self
    }
}

/// Triangle mesh in CPU memory
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,

    /// Triangle indices; empty for non-indexed meshes
    pub indices: Vec<u16>,

    /// Optional per-vertex colors
    pub colors: Option<Vec<[u8; 4]>>,

    /// Optional second texture coordinate set
    pub tex_coords2: Option<Vec<[f32; 2]>>,
}

impl Mesh {
    /// Create a mesh from vertices and indices
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u16>) -> Self {
        Self { vertices, indices, colors: None, tex_coords2: None }
    }

    /// Attach per-vertex colors
    pub fn with_colors(mut self, colors: Vec<[u8; 4]>) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Axis-aligned cube centered at the origin
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        // (normal, tangent, four corners counter-clockwise seen from outside)
        let faces: [([f32; 3], [f32; 4], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0], [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0, 1.0], [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0, 1.0], [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 1.0], [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0, 1.0], [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0, 1.0], [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]]),
        ];
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (face, (normal, tangent, corners)) in faces.iter().enumerate() {
            let base = (face * 4) as u16;
            for (corner, uv) in corners.iter().zip(uvs) {
                vertices.push(Vertex::new(*corner, *normal, uv).with_tangent(*tangent));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self::new(vertices, indices)
    }

    /// Horizontal plane on XZ facing +Y, centered at the origin
    pub fn plane(width: f32, depth: f32) -> Self {
        let (hw, hd) = (width * 0.5, depth * 0.5);
        let normal = [0.0, 1.0, 0.0];
        let tangent = [1.0, 0.0, 0.0, 1.0];
        let vertices = vec![
            Vertex::new([-hw, 0.0, hd], normal, [0.0, 1.0]).with_tangent(tangent),
            Vertex::new([hw, 0.0, hd], normal, [1.0, 1.0]).with_tangent(tangent),
            Vertex::new([hw, 0.0, -hd], normal, [1.0, 0.0]).with_tangent(tangent),
            Vertex::new([-hw, 0.0, -hd], normal, [0.0, 0.0]).with_tangent(tangent),
        ];
        Self::new(vertices, vec![0, 1, 2, 2, 3, 0])
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        if self.indices.is_empty() {
            self.vertices.len() / 3
        } else {
            self.indices.len() / 3
        }
    }

    /// Upload every attribute into its own buffer
    pub fn upload(&self, backend: &SharedBackend) -> RenderResult<GpuMesh> {
        if self.vertices.is_empty() {
            return Err(RenderError::ResourceCreationFailed("Cannot upload an empty mesh".to_string()));
        }

        let positions: Vec<[f32; 3]> = self.vertices.iter().map(|v| v.position).collect();
        let tex_coords: Vec<[f32; 2]> = self.vertices.iter().map(|v| v.tex_coord).collect();
        let normals: Vec<[f32; 3]> = self.vertices.iter().map(|v| v.normal).collect();
        let tangents: Vec<[f32; 4]> = self.vertices.iter().map(|v| v.tangent).collect();

        let mut gpu = backend.borrow_mut();
        let vertex_array = gpu.load_vertex_array();

        let mut load = |bytes: &[u8]| {
            gpu.load_vertex_buffer(bytes, false)
                .ok_or_else(|| RenderError::ResourceCreationFailed("Vertex buffer allocation failed".to_string()))
        };
        let buffers = MeshBuffers {
            positions: load(bytemuck::cast_slice(&positions))?,
            tex_coords: load(bytemuck::cast_slice(&tex_coords))?,
            normals: load(bytemuck::cast_slice(&normals))?,
            tangents: load(bytemuck::cast_slice(&tangents))?,
            colors: self.colors.as_deref().map(|c| load(bytemuck::cast_slice(c))).transpose()?,
            tex_coords2: self.tex_coords2.as_deref().map(|t| load(bytemuck::cast_slice(t))).transpose()?,
            indices: if self.indices.is_empty() {
                None
            } else {
                gpu.load_index_buffer(bytemuck::cast_slice(&self.indices), false)
            },
        };
        drop(gpu);

        log::debug!(
            "Uploaded mesh: {} vertices, {} triangles, vao={:?}",
            self.vertex_count(),
            self.triangle_count(),
            vertex_array
        );

        Ok(GpuMesh {
            backend: backend.clone(),
            vertex_count: self.vertex_count() as i32,
            triangle_count: self.triangle_count() as i32,
            vertex_array,
            buffers,
        })
    }
}

/// Buffers holding a mesh's vertex attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    /// `vec3` positions
    pub positions: BufferId,
    /// `vec2` texture coordinates
    pub tex_coords: BufferId,
    /// `vec3` normals
    pub normals: BufferId,
    /// `vec4` tangents
    pub tangents: BufferId,
    /// Normalized `u8x4` colors
    pub colors: Option<BufferId>,
    /// Second `vec2` texture coordinate set
    pub tex_coords2: Option<BufferId>,
    /// `u16` triangle indices
    pub indices: Option<BufferId>,
}

/// Mesh resident in backend memory, released on drop
pub struct GpuMesh {
    backend: SharedBackend,
    vertex_count: i32,
    triangle_count: i32,
    vertex_array: Option<VertexArrayId>,
    buffers: MeshBuffers,
}

impl std::fmt::Debug for GpuMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuMesh")
            .field("vertex_count", &self.vertex_count)
            .field("triangle_count", &self.triangle_count)
            .field("vertex_array", &self.vertex_array)
            .field("buffers", &self.buffers)
            .finish_non_exhaustive()
    }
}

impl GpuMesh {
    /// Number of vertices
    pub const fn vertex_count(&self) -> i32 {
        self.vertex_count
    }

    /// Number of triangles
    pub const fn triangle_count(&self) -> i32 {
        self.triangle_count
    }

    /// Vertex array, when the backend supports them
    pub const fn vertex_array(&self) -> Option<VertexArrayId> {
        self.vertex_array
    }

    /// Per-attribute buffers
    pub const fn buffers(&self) -> &MeshBuffers {
        &self.buffers
    }

    /// Whether the mesh carries an index buffer
    pub const fn is_indexed(&self) -> bool {
        self.buffers.indices.is_some()
    }
}

impl Drop for GpuMesh {
    fn drop(&mut self) {
        let Ok(mut gpu) = self.backend.try_borrow_mut() else {
            log::error!("Backend busy while dropping mesh, buffers leaked");
            return;
        };
        if let Some(vertex_array) = self.vertex_array.take() {
            gpu.unload_vertex_array(vertex_array);
        }
        let b = self.buffers;
        for buffer in [Some(b.positions), Some(b.tex_coords), Some(b.normals), Some(b.tangents), b.colors, b.tex_coords2, b.indices]
            .into_iter()
            .flatten()
        {
            gpu.unload_buffer(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::render::backends::HeadlessBackend;

    #[test]
    fn test_cube_topology() {
        let cube = Mesh::cube(2.0);
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.indices.iter().all(|&i| usize::from(i) < cube.vertices.len()));
        assert!(cube.vertices.iter().all(|v| v.position.iter().all(|c| c.abs() == 1.0)));
    }

    #[test]
    fn test_upload_and_release() {
        let headless = Rc::new(RefCell::new(HeadlessBackend::new()));
        let backend: SharedBackend = headless.clone();

        let gpu = Mesh::plane(4.0, 4.0).with_colors(vec![[255; 4]; 4]).upload(&backend).expect("upload");
        assert!(gpu.is_indexed());
        assert_eq!(gpu.triangle_count(), 2);
        assert_eq!(headless.borrow().live_buffer_count(), 6);
        assert_eq!(headless.borrow().live_vertex_array_count(), 1);

        drop(gpu);
        assert_eq!(headless.borrow().live_buffer_count(), 0);
        assert_eq!(headless.borrow().live_vertex_array_count(), 0);
        assert_eq!(headless.borrow().invalid_release_count(), 0);
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let backend: SharedBackend = Rc::new(RefCell::new(HeadlessBackend::new()));
        assert!(Mesh::default().upload(&backend).is_err());
    }
}

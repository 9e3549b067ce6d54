//! Geometry and material data consumed by the passes

pub mod material;
pub mod mesh;
pub mod model;

pub use material::{Material, MaterialMap, MaterialMapIndex, MATERIAL_MAP_COUNT};
pub use mesh::{GpuMesh, Mesh, MeshBuffers, Vertex};
pub use model::Model;

//! Models: uploaded meshes paired with materials

use crate::foundation::math::Mat4;

use super::material::Material;
use super::mesh::GpuMesh;

/// A set of meshes sharing one base transform
#[derive(Debug)]
pub struct Model {
    /// Base transform applied before the per-draw transform
    pub transform: Mat4,

    /// Uploaded meshes
    pub meshes: Vec<GpuMesh>,

    /// Materials referenced by `mesh_material`
    pub materials: Vec<Material>,

    /// Material index for each mesh
    pub mesh_material: Vec<usize>,
}

impl Model {
    /// Model made of a single mesh and material
    pub fn from_mesh(mesh: GpuMesh, material: Material) -> Self {
        Self {
            transform: Mat4::identity(),
            meshes: vec![mesh],
            materials: vec![material],
            mesh_material: vec![0],
        }
    }

    /// Replace the base transform
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Meshes paired with their materials
    ///
    /// A mesh whose material index is out of range falls back to the default
    /// material.
    pub fn parts(&self) -> impl Iterator<Item = (&GpuMesh, Material)> + '_ {
        self.meshes.iter().enumerate().map(|(i, mesh)| {
            let material = self
                .mesh_material
                .get(i)
                .and_then(|&m| self.materials.get(m))
                .copied()
                .unwrap_or_default();
            (mesh, material)
        })
    }
}

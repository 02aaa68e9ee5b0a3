//! The builder interface every reader writes into.
//!
//! Readers never construct meshes themselves. They call a [`MeshBuilder`],
//! which owns whatever mesh representation the caller wants. Builders are
//! append-only: vertex and triangle ids are dense, zero-based and assigned in
//! call order, and a builder never merges or reorders anything. Vertex
//! deduplication is the reader's job.

use mesh_types::{IndexedMesh, Point3, Vertex, VertexAttributes, VertexColor, Vector3};

use crate::material::Material;

/// Capability hints passed when a mesh is begun.
///
/// Hints let a builder pre-allocate attribute storage; they are not
/// requirements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshHints {
    /// Vertices will carry normals.
    pub vertex_normals: bool,
    /// Vertices will carry colors.
    pub vertex_colors: bool,
    /// Vertices will carry texture coordinates.
    pub vertex_uvs: bool,
    /// Triangles will carry group ids.
    pub face_groups: bool,
}

impl MeshHints {
    /// No optional attributes.
    pub const NONE: Self = Self {
        vertex_normals: false,
        vertex_colors: false,
        vertex_uvs: false,
        face_groups: false,
    };
}

/// A vertex with optional attributes, for [`MeshBuilder::append_vertex_info`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewVertexInfo {
    /// Position.
    pub position: [f64; 3],
    /// Normal.
    pub normal: Option<[f32; 3]>,
    /// RGB color.
    pub color: Option<[f32; 3]>,
    /// Texture coordinates.
    pub uv: Option<[f32; 2]>,
}

impl NewVertexInfo {
    /// Position-only vertex info.
    #[must_use]
    pub const fn at(position: [f64; 3]) -> Self {
        Self {
            position,
            normal: None,
            color: None,
            uv: None,
        }
    }

    /// Whether any optional attribute is set.
    #[must_use]
    pub const fn has_attributes(&self) -> bool {
        self.normal.is_some() || self.color.is_some() || self.uv.is_some()
    }
}

/// Target of every reader.
///
/// Calling [`append_triangle`](Self::append_triangle) with ids that were not
/// returned by `append_vertex*` for the current mesh is a contract violation;
/// the result is unspecified.
pub trait MeshBuilder {
    /// Start a new mesh and make it current. Returns its id.
    fn begin_mesh(&mut self, hints: MeshHints) -> usize;

    /// Append a position-only vertex to the current mesh.
    ///
    /// Readers use this overload whenever no attribute is being set.
    fn append_vertex(&mut self, x: f64, y: f64, z: f64) -> u32;

    /// Append a vertex with optional attributes to the current mesh.
    fn append_vertex_info(&mut self, info: &NewVertexInfo) -> u32;

    /// Append a triangle over vertices of the current mesh.
    fn append_triangle(&mut self, a: u32, b: u32, c: u32) -> u32;

    /// Register a material. Returns its builder-side id.
    fn build_material(&mut self, material: &Material) -> usize;

    /// Associate a material (builder-side id) with a whole mesh.
    fn assign_material(&mut self, material_id: usize, mesh_id: usize);
}

/// Default builder, collecting [`IndexedMesh`]es.
#[derive(Debug, Clone, Default)]
pub struct IndexedMeshBuilder {
    meshes: Vec<IndexedMesh>,
    hints: Vec<MeshHints>,
    materials: Vec<Material>,
    mesh_materials: Vec<Option<usize>>,
}

impl IndexedMeshBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Meshes built so far, in id order.
    #[must_use]
    pub fn meshes(&self) -> &[IndexedMesh] {
        &self.meshes
    }

    /// Consume the builder, returning its meshes.
    #[must_use]
    pub fn into_meshes(self) -> Vec<IndexedMesh> {
        self.meshes
    }

    /// Materials built so far, in id order.
    #[must_use]
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Hints the given mesh was begun with.
    #[must_use]
    pub fn hints(&self, mesh_id: usize) -> Option<MeshHints> {
        self.hints.get(mesh_id).copied()
    }

    /// Material assigned to a mesh, if any.
    #[must_use]
    pub fn material_of(&self, mesh_id: usize) -> Option<&Material> {
        let material_id = (*self.mesh_materials.get(mesh_id)?)?;
        self.materials.get(material_id)
    }

    /// Drop everything built so far.
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.hints.clear();
        self.materials.clear();
        self.mesh_materials.clear();
    }

    fn current(&mut self) -> &mut IndexedMesh {
        // Readers always begin a mesh first; tolerate misuse with an implicit one.
        if self.meshes.is_empty() {
            self.begin_mesh(MeshHints::NONE);
        }
        let last = self.meshes.len() - 1;
        &mut self.meshes[last]
    }
}

#[allow(clippy::cast_possible_truncation)]
// Truncation: mesh indices are u32, meshes with >4B vertices are unsupported
impl MeshBuilder for IndexedMeshBuilder {
    fn begin_mesh(&mut self, hints: MeshHints) -> usize {
        self.meshes.push(IndexedMesh::new());
        self.hints.push(hints);
        self.mesh_materials.push(None);
        self.meshes.len() - 1
    }

    fn append_vertex(&mut self, x: f64, y: f64, z: f64) -> u32 {
        let mesh = self.current();
        mesh.vertices.push(Vertex::from_coords(x, y, z));
        (mesh.vertices.len() - 1) as u32
    }

    fn append_vertex_info(&mut self, info: &NewVertexInfo) -> u32 {
        let [x, y, z] = info.position;
        let attributes = VertexAttributes {
            normal: info.normal.map(|[nx, ny, nz]| Vector3::new(nx, ny, nz)),
            color: info.color.map(VertexColor::from),
            uv: info.uv.map(|[u, v]| (u, v)),
        };
        let mesh = self.current();
        mesh.vertices
            .push(Vertex::with_attributes(Point3::new(x, y, z), attributes));
        (mesh.vertices.len() - 1) as u32
    }

    fn append_triangle(&mut self, a: u32, b: u32, c: u32) -> u32 {
        let mesh = self.current();
        mesh.faces.push([a, b, c]);
        (mesh.faces.len() - 1) as u32
    }

    fn build_material(&mut self, material: &Material) -> usize {
        self.materials.push(material.clone());
        self.materials.len() - 1
    }

    fn assign_material(&mut self, material_id: usize, mesh_id: usize) {
        if let Some(slot) = self.mesh_materials.get_mut(mesh_id) {
            *slot = Some(material_id);
        }
    }
}

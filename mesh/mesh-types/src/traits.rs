//! Traits for mesh types.

use crate::Vertex;

/// Read-only access to a triangle mesh.
///
/// Writers and serializers only need to enumerate vertices and faces, so
/// they accept any type implementing this trait instead of a concrete mesh.
pub trait MeshTopology {
    /// Get the number of vertices.
    fn vertex_count(&self) -> usize;

    /// Get the number of faces (triangles).
    fn face_count(&self) -> usize;

    /// Check if the mesh is empty.
    fn is_empty(&self) -> bool {
        self.vertex_count() == 0 || self.face_count() == 0
    }

    /// Get a vertex by index.
    ///
    /// Returns `None` if the index is out of bounds.
    fn vertex(&self, index: usize) -> Option<&Vertex>;

    /// Get a face by index.
    ///
    /// Returns `None` if the index is out of bounds.
    /// The returned array contains vertex indices.
    fn face(&self, index: usize) -> Option<[u32; 3]>;

    /// Iterate over all vertices in id order.
    fn vertices(&self) -> impl Iterator<Item = &Vertex>;

    /// Iterate over all faces as vertex index triples, in id order.
    fn faces(&self) -> impl Iterator<Item = [u32; 3]>;

    /// Whether any vertex carries a normal.
    fn has_normals(&self) -> bool {
        self.vertices().any(|v| v.normal().is_some())
    }

    /// Whether any vertex carries a color.
    fn has_colors(&self) -> bool {
        self.vertices().any(|v| v.color().is_some())
    }

    /// Whether any vertex carries texture coordinates.
    fn has_uvs(&self) -> bool {
        self.vertices().any(|v| v.uv().is_some())
    }
}

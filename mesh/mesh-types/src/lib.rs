//! Core mesh types for the mesh interchange workspace.
//!
//! This crate provides the in-memory representation that mesh readers build
//! into and mesh writers read from:
//!
//! - [`Vertex`] - A point in 3D space with optional normal, color and UV
//! - [`IndexedMesh`] - A triangle mesh with indexed vertices
//! - [`MeshTopology`] - Read-only accessor over any triangle mesh
//!
//! # Units
//!
//! This library is **unit-agnostic**. All coordinates are `f64`.
//!
//! # Example
//!
//! ```
//! use mesh_types::{Vertex, IndexedMesh, Point3, MeshTopology};
//!
//! let mut mesh = IndexedMesh::new();
//! mesh.vertices.push(Vertex::new(Point3::new(0.0, 0.0, 0.0)));
//! mesh.vertices.push(Vertex::new(Point3::new(1.0, 0.0, 0.0)));
//! mesh.vertices.push(Vertex::new(Point3::new(0.5, 1.0, 0.0)));
//! mesh.faces.push([0, 1, 2]);
//!
//! assert_eq!(mesh.face_count(), 1);
//! assert!(!mesh.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod mesh;
mod traits;
mod vertex;

pub use mesh::{IndexedMesh, unit_cube};
pub use traits::MeshTopology;
pub use vertex::{Vertex, VertexAttributes, VertexColor};

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};

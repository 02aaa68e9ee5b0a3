//! Mesh file interchange for CortenForge.
//!
//! This crate loads and saves indexed triangle meshes through one reader
//! registry:
//!
//! - **OBJ** (Wavefront) - ASCII, with `.mtl` material libraries
//! - **STL** (Stereolithography) - Binary and ASCII, auto-detected
//! - **OFF** (Object File Format) - ASCII, line-incremental
//! - **PLY** (Polygon File Format) - Binary and ASCII
//! - **Mesh container** (`.meshbin`) - a four-mesh binary bundle
//!
//! Readers never build meshes directly. They write into a [`MeshBuilder`];
//! [`IndexedMeshBuilder`] is the default target and collects
//! [`IndexedMesh`]es. Deduplication is done by the readers: STL welds equal
//! positions, OBJ merges equal `(position, normal, uv)` corners.
//!
//! # Runtime
//!
//! The synchronous API needs no async runtime. The `*_async` readers run on
//! any tokio runtime and only use its I/O traits and `select!`.
//!
//! # Example
//!
//! ```no_run
//! use mesh_interchange::{ReadOptions, StandardMeshReader};
//!
//! let mut reader = StandardMeshReader::new();
//! let summary = reader.read_path("model.obj", &ReadOptions::default()).unwrap();
//! println!("{} meshes from {}", summary.meshes, summary.format);
//!
//! let meshes = reader.take_builder().unwrap().into_meshes();
//! ```
//!
//! # Format Detection
//!
//! The convenience functions pick the format from the extension:
//!
//! ```no_run
//! use mesh_interchange::{load_mesh, save_mesh};
//!
//! let mesh = load_mesh("model.stl").unwrap();
//! save_mesh(&mesh, "model.obj").unwrap();
//! ```
//!
//! # Cancellation
//!
//! [`StandardMeshReader::read_async`] and
//! [`StandardMeshReader::read_path_async`] take a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and return
//! [`IoError::Cancelled`] when it fires.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod builder;
mod container;
mod error;
mod material;
mod number;
pub mod obj;
mod off;
mod options;
mod ply;
mod registry;
mod stl;
mod warnings;
mod writer;

pub use builder::{IndexedMeshBuilder, MeshBuilder, MeshHints, NewVertexInfo};
pub use container::{
    CONTAINER_EXTENSION, CONTAINER_MESH_COUNT, ContainerFormatReader, MeshBlock, decode_container,
    decode_mesh, store_mesh, write_container,
};
pub use error::{IoCode, IoError, IoResult, ReadResult};
pub use material::{Material, TextureMaps, UNSUPPORTED_COLOR};
pub use number::NumberFormat;
pub use obj::{ObjFormatReader, write_obj};
pub use off::{OffFormatReader, OffParser, read_off, read_off_async, write_off};
pub use options::{ReadOptions, WriteOptions};
pub use ply::{
    ColumnData, ElementColumns, ElementKind, PlyFormatReader, PropertyColumn, read_columns,
    write_ply,
};
pub use registry::{MeshFormatReader, MeshSource, ReadSummary, StandardMeshReader};
pub use stl::{DETECTION_WINDOW, StlFormatReader, write_stl};
pub use warnings::{
    ReadWarning, WARNING_REPEAT_LIMIT, WarningContext, WarningHandler, Warnings,
};
pub use writer::{save_mesh, save_meshes, write_meshes};

use std::io::{BufRead, Seek};
use std::path::Path;

use mesh_types::IndexedMesh;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// OBJ (Wavefront) format.
    /// ASCII, supports normals, UVs, vertex colors and materials.
    Obj,
    /// STL (Stereolithography) format.
    /// Supports binary and ASCII variants.
    Stl,
    /// OFF (Object File Format).
    /// ASCII, positions and triangles only.
    Off,
    /// PLY (Polygon File Format).
    /// Supports binary and ASCII variants.
    Ply,
    /// Binary bundle of exactly four meshes.
    Container,
}

impl MeshFormat {
    /// Detect format from file extension.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to check for extension
    ///
    /// # Returns
    ///
    /// The detected format, or `None` if the extension is not recognized.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        Self::from_extension(path.as_ref().extension()?.to_str()?)
    }

    /// Format for an extension without the dot, case-insensitive.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "obj" => Some(Self::Obj),
            "stl" => Some(Self::Stl),
            "off" => Some(Self::Off),
            "ply" => Some(Self::Ply),
            CONTAINER_EXTENSION => Some(Self::Container),
            _ => None,
        }
    }

    /// Get the canonical file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Stl => "stl",
            Self::Off => "off",
            Self::Ply => "ply",
            Self::Container => CONTAINER_EXTENSION,
        }
    }
}

/// Registry with every built-in handler, PLY included.
fn full_reader() -> IoResult<StandardMeshReader> {
    let mut reader = StandardMeshReader::new();
    reader.register(PlyFormatReader)?;
    Ok(reader)
}

/// All meshes a finished read produced.
fn built_meshes(mut reader: StandardMeshReader) -> Vec<IndexedMesh> {
    reader
        .take_builder()
        .map(IndexedMeshBuilder::into_meshes)
        .unwrap_or_default()
}

fn first_mesh(meshes: Vec<IndexedMesh>) -> IoResult<IndexedMesh> {
    meshes
        .into_iter()
        .next()
        .ok_or_else(|| IoError::garbage("no mesh was read"))
}

/// Load every mesh in a file, detecting format from extension.
///
/// Material libraries are searched for next to the file.
///
/// # Errors
///
/// Returns an error if:
/// - The path has no extension, or no handler accepts it
/// - The file cannot be read
/// - The file content is invalid for the detected format
pub fn load_meshes<P: AsRef<Path>>(path: P) -> IoResult<Vec<IndexedMesh>> {
    let mut reader = full_reader()?;
    reader.read_path(path, &ReadOptions::default())?;
    Ok(built_meshes(reader))
}

/// Load a mesh from a file, detecting format from extension.
///
/// Files holding several meshes (OBJ material groups, multi-solid STL, the
/// mesh container) yield the first one; use [`load_meshes`] for all of them.
///
/// # Arguments
///
/// * `path` - Path to the mesh file
///
/// # Errors
///
/// As [`load_meshes`].
///
/// # Example
///
/// ```no_run
/// use mesh_interchange::load_mesh;
///
/// let mesh = load_mesh("model.stl").unwrap();
/// ```
pub fn load_mesh<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    first_mesh(load_meshes(path)?)
}

/// Read the first mesh of an in-memory or seekable stream.
///
/// # Errors
///
/// [`IoError::UnknownFormat`] if no handler accepts `extension`, otherwise
/// any error of the selected handler.
pub fn read_mesh<R: BufRead + Seek>(source: &mut R, extension: &str) -> IoResult<IndexedMesh> {
    let mut reader = full_reader()?;
    reader.read(source, extension, &ReadOptions::without_materials())?;
    first_mesh(built_meshes(reader))
}

/// Asynchronous [`read_mesh`] with cancellation.
///
/// # Errors
///
/// [`IoError::Cancelled`] if `cancel` fires first, otherwise as
/// [`read_mesh`].
pub async fn read_mesh_async<R>(
    source: &mut R,
    extension: &str,
    cancel: &CancellationToken,
) -> IoResult<IndexedMesh>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut reader = full_reader()?;
    reader
        .read_async(source, extension, &ReadOptions::without_materials(), cancel)
        .await?;
    first_mesh(built_meshes(reader))
}

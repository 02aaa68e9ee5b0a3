//! Writer dispatch and helpers shared by the format writers.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mesh_types::{MeshTopology, Point3};
use tracing::info;

use crate::MeshFormat;
use crate::container::write_container;
use crate::error::{IoError, IoResult};
use crate::obj::write_obj;
use crate::off::write_off;
use crate::options::WriteOptions;
use crate::ply::write_ply;
use crate::stl::write_stl;

/// Write `meshes` to `writer` in `format`.
///
/// # Errors
///
/// Returns [`IoError::InvalidInput`] if the meshes cannot be represented in
/// `format`, or an I/O error if writing fails.
pub fn write_meshes<M: MeshTopology, W: Write>(
    writer: &mut W,
    format: MeshFormat,
    meshes: &[M],
    options: &WriteOptions,
) -> IoResult<()> {
    match format {
        MeshFormat::Obj => write_obj(writer, meshes, options),
        MeshFormat::Stl => write_stl(writer, meshes, options),
        MeshFormat::Off => write_off(writer, meshes, options),
        MeshFormat::Ply => write_ply(writer, meshes, options),
        MeshFormat::Container => write_container(writer, meshes),
    }
}

/// Save a mesh to a file, detecting format from extension.
///
/// Binary encodings are used where the format has one.
///
/// # Errors
///
/// Returns an error if:
/// - The file format cannot be determined from the extension
/// - The mesh cannot be represented in that format
/// - The file cannot be written
///
/// # Example
///
/// ```no_run
/// use mesh_interchange::{load_mesh, save_mesh};
///
/// let mesh = load_mesh("input.stl").unwrap();
/// save_mesh(&mesh, "output.obj").unwrap();
/// ```
pub fn save_mesh<M: MeshTopology, P: AsRef<Path>>(mesh: &M, path: P) -> IoResult<()> {
    save_meshes(
        std::slice::from_ref(mesh),
        path,
        &WriteOptions::default(),
    )
}

/// Save several meshes to one file, detecting format from extension.
///
/// # Errors
///
/// As [`save_mesh`].
pub fn save_meshes<M: MeshTopology, P: AsRef<Path>>(
    meshes: &[M],
    path: P,
    options: &WriteOptions,
) -> IoResult<()> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path).ok_or_else(|| IoError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })?;

    let file = File::create(path).map_err(|e| IoError::FileAccess {
        message: format!("{} for writing: {e}", path.display()),
    })?;
    let mut writer = BufWriter::new(file);
    write_meshes(&mut writer, format, meshes, options)?;
    writer.flush()?;
    info!(path = %path.display(), format = format.extension(), meshes = meshes.len(), "saved meshes");
    Ok(())
}

/// The only mesh of `meshes`, for single-mesh formats.
pub(crate) fn single_mesh<'a, M: MeshTopology>(meshes: &'a [M], format: &str) -> IoResult<&'a M> {
    match meshes {
        [mesh] => Ok(mesh),
        _ => Err(IoError::invalid_input(format!(
            "{format} holds exactly one mesh, got {}",
            meshes.len()
        ))),
    }
}

/// Check every face index refers to an existing vertex.
pub(crate) fn validate_faces<M: MeshTopology>(mesh: &M) -> IoResult<()> {
    let count = mesh.vertex_count();
    match mesh
        .faces()
        .enumerate()
        .find(|(_, face)| face.iter().any(|&i| i as usize >= count))
    {
        Some((index, face)) => Err(IoError::invalid_input(format!(
            "face {index} {face:?} references a missing vertex ({count} vertices)"
        ))),
        None => Ok(()),
    }
}

/// Corner positions of a face.
pub(crate) fn face_positions<M: MeshTopology>(
    mesh: &M,
    face: [u32; 3],
) -> IoResult<[Point3<f64>; 3]> {
    let corner = |i: u32| {
        mesh.vertex(i as usize)
            .map(|v| v.position)
            .ok_or_else(|| {
                IoError::invalid_input(format!("face {face:?} references missing vertex {i}"))
            })
    };
    Ok([corner(face[0])?, corner(face[1])?, corner(face[2])?])
}

/// Unit normal of a triangle, zero when degenerate.
pub(crate) fn face_normal(corners: &[Point3<f64>; 3]) -> [f32; 3] {
    let [v0, v1, v2] = corners;
    let normal = (v1 - v0).cross(&(v2 - v0));
    let len = normal.norm();
    if len > f64::EPSILON {
        #[allow(clippy::cast_possible_truncation)]
        // Truncation: normals are stored as f32
        [
            (normal.x / len) as f32,
            (normal.y / len) as f32,
            (normal.z / len) as f32,
        ]
    } else {
        [0.0; 3]
    }
}

//! Wavefront OBJ output.

use std::io::Write;

use mesh_types::{MeshTopology, Vector3};

use crate::error::IoResult;
use crate::options::WriteOptions;
use crate::writer::validate_faces;

/// Write `meshes` as one OBJ document, one `o` object per mesh.
///
/// Normals, colors and UVs are written when enabled in `options` and present
/// on the mesh. Attributes are emitted per vertex, so every face corner uses
/// the same local index for all of its references.
///
/// # Errors
///
/// Returns [`IoError::InvalidInput`](crate::IoError::InvalidInput) if a face
/// references a missing vertex, or an I/O error if writing fails.
pub fn write_obj<M: MeshTopology, W: Write>(
    writer: &mut W,
    meshes: &[M],
    options: &WriteOptions,
) -> IoResult<()> {
    for mesh in meshes {
        validate_faces(mesh)?;
    }
    let format = options.number_format;

    writeln!(writer, "# OBJ file generated by mesh-interchange")?;
    // 1-based offsets of the next v, vt and vn records.
    let (mut v_base, mut vt_base, mut vn_base) = (1_usize, 1_usize, 1_usize);

    for (index, mesh) in meshes.iter().enumerate() {
        let colors = options.write_colors && mesh.has_colors();
        let normals = options.write_normals && mesh.has_normals();
        let uvs = options.write_uvs && mesh.has_uvs();

        writeln!(writer, "o mesh{index}")?;
        for v in mesh.vertices() {
            let p = &v.position;
            write!(
                writer,
                "v {} {} {}",
                format.format(p.x),
                format.format(p.y),
                format.format(p.z)
            )?;
            if colors {
                let [r, g, b] = v.color().unwrap_or_default().to_array();
                write!(
                    writer,
                    " {} {} {}",
                    format.format(r),
                    format.format(g),
                    format.format(b)
                )?;
            }
            writeln!(writer)?;
        }
        if uvs {
            for v in mesh.vertices() {
                let (u, t) = v.uv().unwrap_or_default();
                writeln!(writer, "vt {} {}", format.format(u), format.format(t))?;
            }
        }
        if normals {
            for v in mesh.vertices() {
                let n = v.normal().unwrap_or_else(Vector3::zeros);
                writeln!(
                    writer,
                    "vn {} {} {}",
                    format.format(n.x),
                    format.format(n.y),
                    format.format(n.z)
                )?;
            }
        }

        for face in mesh.faces() {
            write!(writer, "f")?;
            for i in face {
                let i = i as usize;
                let v = v_base + i;
                match (uvs, normals) {
                    (false, false) => write!(writer, " {v}")?,
                    (false, true) => write!(writer, " {v}//{}", vn_base + i)?,
                    (true, false) => write!(writer, " {v}/{}", vt_base + i)?,
                    (true, true) => write!(writer, " {v}/{}/{}", vt_base + i, vn_base + i)?,
                }
            }
            writeln!(writer)?;
        }

        let count = mesh.vertex_count();
        v_base += count;
        if uvs {
            vt_base += count;
        }
        if normals {
            vn_base += count;
        }
    }
    Ok(())
}

//! Binary mesh container.
//!
//! A private little-endian layout holding exactly [`CONTAINER_MESH_COUNT`]
//! meshes. There is no magic number and no version field: the leading mesh
//! count is the only structural check, and any other count is rejected.
//!
//! ```text
//! UINT32           – Mesh count (must be CONTAINER_MESH_COUNT)
//! foreach mesh
//!     UINT32       – Vertex count
//!     UINT32       – Attribute flags (bit 0 normals, bit 1 colors, bit 2 uvs)
//!     foreach vertex
//!         REAL64[3] – Position
//!         REAL32[3] – Normal (if flagged)
//!         REAL32[3] – Color (if flagged)
//!         REAL32[2] – UV (if flagged)
//!     UINT32       – Triangle count
//!     UINT32[3]    – Triangle vertex ids, per triangle
//! end
//! ```
//!
//! Every block is decoded and validated before the first mesh is handed to
//! the builder.

use std::io::{ErrorKind, Read, Write};

use mesh_types::MeshTopology;

use crate::builder::{MeshBuilder, MeshHints, NewVertexInfo};
use crate::error::{IoError, IoResult};
use crate::options::ReadOptions;
use crate::registry::{MeshFormatReader, MeshSource};
use crate::warnings::Warnings;
use crate::writer::validate_faces;

/// Number of meshes a container holds.
pub const CONTAINER_MESH_COUNT: u32 = 4;

/// File extension of the container.
pub const CONTAINER_EXTENSION: &str = "meshbin";

const FLAG_NORMALS: u32 = 1;
const FLAG_COLORS: u32 = 1 << 1;
const FLAG_UVS: u32 = 1 << 2;

/// Upper bound on speculative allocation from untrusted counts.
const MAX_RESERVE: usize = 1 << 20;

/// One decoded mesh block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBlock {
    /// Attribute flags.
    pub flags: u32,
    /// Vertices.
    pub vertices: Vec<NewVertexInfo>,
    /// Triangles.
    pub triangles: Vec<[u32; 3]>,
}

impl MeshBlock {
    const fn hints(&self) -> MeshHints {
        MeshHints {
            vertex_normals: self.flags & FLAG_NORMALS != 0,
            vertex_colors: self.flags & FLAG_COLORS != 0,
            vertex_uvs: self.flags & FLAG_UVS != 0,
            face_groups: false,
        }
    }

    /// Replay the block into `builder` as a new mesh. Returns the mesh id.
    pub fn restore(&self, builder: &mut dyn MeshBuilder) -> usize {
        let mesh_id = builder.begin_mesh(self.hints());
        for info in &self.vertices {
            if info.has_attributes() {
                builder.append_vertex_info(info);
            } else {
                let [x, y, z] = info.position;
                builder.append_vertex(x, y, z);
            }
        }
        for &[a, b, c] in &self.triangles {
            builder.append_triangle(a, b, c);
        }
        mesh_id
    }
}

/// Store one mesh block.
///
/// # Errors
///
/// Returns an error if writing fails or the mesh is too large for the
/// 32-bit counts.
pub fn store_mesh<M: MeshTopology, W: Write + ?Sized>(mesh: &M, writer: &mut W) -> IoResult<()> {
    let mut flags = 0;
    for v in mesh.vertices() {
        if v.normal().is_some() {
            flags |= FLAG_NORMALS;
        }
        if v.color().is_some() {
            flags |= FLAG_COLORS;
        }
        if v.uv().is_some() {
            flags |= FLAG_UVS;
        }
    }

    write_u32(writer, count_u32(mesh.vertex_count(), "vertices")?)?;
    write_u32(writer, flags)?;
    for v in mesh.vertices() {
        for c in [v.position.x, v.position.y, v.position.z] {
            writer.write_all(&c.to_le_bytes())?;
        }
        if flags & FLAG_NORMALS != 0 {
            let n = v.normal().map_or([0.0; 3], |n| [n.x, n.y, n.z]);
            write_f32s(writer, &n)?;
        }
        if flags & FLAG_COLORS != 0 {
            let c = v.color().map_or([0.0; 3], |c| c.to_array());
            write_f32s(writer, &c)?;
        }
        if flags & FLAG_UVS != 0 {
            let (u, w) = v.uv().unwrap_or((0.0, 0.0));
            write_f32s(writer, &[u, w])?;
        }
    }

    write_u32(writer, count_u32(mesh.face_count(), "triangles")?)?;
    for face in mesh.faces() {
        for i in face {
            write_u32(writer, i)?;
        }
    }
    Ok(())
}

/// Decode one mesh block.
///
/// # Errors
///
/// [`IoError::FileParsing`] if the block is truncated or a triangle references
/// a missing vertex.
pub fn decode_mesh<R: Read + ?Sized>(reader: &mut R) -> IoResult<MeshBlock> {
    let vertex_count = read_u32(reader)? as usize;
    let flags = read_u32(reader)?;

    let mut vertices = Vec::with_capacity(vertex_count.min(MAX_RESERVE));
    for _ in 0..vertex_count {
        let mut info = NewVertexInfo::at([read_f64(reader)?, read_f64(reader)?, read_f64(reader)?]);
        if flags & FLAG_NORMALS != 0 {
            info.normal = Some(read_f32s(reader)?);
        }
        if flags & FLAG_COLORS != 0 {
            info.color = Some(read_f32s(reader)?);
        }
        if flags & FLAG_UVS != 0 {
            info.uv = Some(read_f32s(reader)?);
        }
        vertices.push(info);
    }

    let triangle_count = read_u32(reader)? as usize;
    let mut triangles = Vec::with_capacity(triangle_count.min(MAX_RESERVE));
    for t in 0..triangle_count {
        let tri = [read_u32(reader)?, read_u32(reader)?, read_u32(reader)?];
        if tri.iter().any(|&i| i as usize >= vertex_count) {
            return Err(IoError::parsing(format!(
                "container triangle {t} {tri:?} references a missing vertex ({vertex_count} vertices)"
            )));
        }
        triangles.push(tri);
    }

    Ok(MeshBlock {
        flags,
        vertices,
        triangles,
    })
}

/// Decode a whole container.
///
/// # Errors
///
/// [`IoError::FileParsing`] if the mesh count is not [`CONTAINER_MESH_COUNT`]
/// or a block is malformed.
pub fn decode_container<R: Read + ?Sized>(reader: &mut R) -> IoResult<Vec<MeshBlock>> {
    let count = read_u32(reader)?;
    if count != CONTAINER_MESH_COUNT {
        return Err(IoError::parsing(format!(
            "mesh container must hold {CONTAINER_MESH_COUNT} meshes, header declares {count}"
        )));
    }
    (0..count).map(|_| decode_mesh(reader)).collect()
}

/// Write a container.
///
/// # Errors
///
/// [`IoError::InvalidInput`] unless exactly [`CONTAINER_MESH_COUNT`] meshes
/// are given, or a face references a missing vertex.
pub fn write_container<M: MeshTopology, W: Write + ?Sized>(
    writer: &mut W,
    meshes: &[M],
) -> IoResult<()> {
    if meshes.len() != CONTAINER_MESH_COUNT as usize {
        return Err(IoError::invalid_input(format!(
            "mesh container holds exactly {CONTAINER_MESH_COUNT} meshes, got {}",
            meshes.len()
        )));
    }
    for mesh in meshes {
        validate_faces(mesh)?;
    }
    write_u32(writer, CONTAINER_MESH_COUNT)?;
    for mesh in meshes {
        store_mesh(mesh, writer)?;
    }
    Ok(())
}

/// Container handler for the registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerFormatReader;

impl MeshFormatReader for ContainerFormatReader {
    fn name(&self) -> &'static str {
        "container"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[CONTAINER_EXTENSION]
    }

    fn read(
        &self,
        source: &mut dyn MeshSource,
        builder: &mut dyn MeshBuilder,
        _options: &ReadOptions,
        _warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        for block in decode_container(source)? {
            block.restore(builder);
        }
        Ok(())
    }
}

fn count_u32(count: usize, what: &str) -> IoResult<u32> {
    u32::try_from(count)
        .map_err(|_| IoError::invalid_input(format!("too many {what} for a container block")))
}

fn write_u32<W: Write + ?Sized>(writer: &mut W, value: u32) -> IoResult<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_f32s<W: Write + ?Sized>(writer: &mut W, values: &[f32]) -> IoResult<()> {
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_bytes<const N: usize, R: Read + ?Sized>(reader: &mut R) -> IoResult<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            IoError::parsing("mesh container is truncated")
        } else {
            IoError::Io(e)
        }
    })?;
    Ok(buf)
}

fn read_u32<R: Read + ?Sized>(reader: &mut R) -> IoResult<u32> {
    read_bytes::<4, _>(reader).map(u32::from_le_bytes)
}

fn read_f64<R: Read + ?Sized>(reader: &mut R) -> IoResult<f64> {
    read_bytes::<8, _>(reader).map(f64::from_le_bytes)
}

fn read_f32s<const N: usize, R: Read + ?Sized>(reader: &mut R) -> IoResult<[f32; N]> {
    let mut values = [0.0; N];
    for v in &mut values {
        *v = read_bytes::<4, _>(reader).map(f32::from_le_bytes)?;
    }
    Ok(values)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::builder::IndexedMeshBuilder;
    use crate::error::IoCode;
    use mesh_types::{
        IndexedMesh, MeshTopology, Vertex, VertexAttributes, VertexColor, Vector3, unit_cube,
    };
    use std::io::Cursor;

    fn attributed_triangle() -> IndexedMesh {
        let attributes = VertexAttributes {
            normal: Some(Vector3::new(0.0, 0.0, 1.0)),
            color: Some(VertexColor::RED),
            uv: Some((0.25, 0.75)),
        };
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::with_attributes(
            mesh_types::Point3::new(0.0, 0.0, 0.0),
            attributes,
        ));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    fn four_meshes() -> Vec<IndexedMesh> {
        vec![unit_cube(), attributed_triangle(), IndexedMesh::new(), unit_cube()]
    }

    fn read(bytes: Vec<u8>) -> IoResult<IndexedMeshBuilder> {
        let mut builder = IndexedMeshBuilder::new();
        ContainerFormatReader.read(
            &mut Cursor::new(bytes),
            &mut builder,
            &ReadOptions::default(),
            &mut Warnings::silent(),
        )?;
        Ok(builder)
    }

    #[test]
    fn roundtrip_preserves_meshes() {
        let meshes = four_meshes();
        let mut out = Vec::new();
        write_container(&mut out, &meshes).unwrap();

        let builder = read(out).unwrap();
        assert_eq!(builder.meshes().len(), 4);
        assert_eq!(builder.meshes()[0], meshes[0]);
        assert!(builder.meshes()[2].is_empty());

        let tri = &builder.meshes()[1];
        assert_eq!(tri.vertices[0].uv(), Some((0.25, 0.75)));
        assert_eq!(tri.vertices[0].color(), Some(VertexColor::RED));
        // Flagged attributes are stored for every vertex of the block.
        assert_eq!(tri.vertices[1].uv(), Some((0.0, 0.0)));
        assert!(builder.hints(1).unwrap().vertex_normals);
    }

    #[test]
    fn wrong_mesh_count_is_rejected() {
        let mut bytes = 3u32.to_le_bytes().to_vec();
        for mesh in four_meshes().iter().take(3) {
            store_mesh(mesh, &mut bytes).unwrap();
        }
        let err = read(bytes).unwrap_err();
        assert_eq!(err.code(), IoCode::FileParsingError);

        let mut out = Vec::new();
        let err = write_container(&mut out, &[unit_cube()]).unwrap_err();
        assert_eq!(err.code(), IoCode::InvalidInputError);
        assert!(out.is_empty());
    }

    #[test]
    fn truncation_applies_nothing() {
        let mut out = Vec::new();
        write_container(&mut out, &four_meshes()).unwrap();
        out.truncate(out.len() - 5);

        let mut builder = IndexedMeshBuilder::new();
        let err = ContainerFormatReader
            .read(
                &mut Cursor::new(out),
                &mut builder,
                &ReadOptions::default(),
                &mut Warnings::silent(),
            )
            .unwrap_err();
        assert_eq!(err.code(), IoCode::FileParsingError);
        assert!(builder.meshes().is_empty());
    }

    #[test]
    fn dangling_index_is_parsing_error() {
        let mut block = Vec::new();
        write_u32(&mut block, 1).unwrap();
        write_u32(&mut block, 0).unwrap();
        for _ in 0..3 {
            block.extend_from_slice(&0.0f64.to_le_bytes());
        }
        write_u32(&mut block, 1).unwrap();
        for i in [0, 0, 1] {
            write_u32(&mut block, i).unwrap();
        }
        let err = decode_mesh(&mut Cursor::new(block)).unwrap_err();
        assert_eq!(err.code(), IoCode::FileParsingError);
    }
}

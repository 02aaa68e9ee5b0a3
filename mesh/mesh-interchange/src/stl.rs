//! STL (Stereolithography) file format support.
//!
//! STL stores a flat list of independent triangles, each with its own three
//! corner positions. The reader rebuilds shared-vertex topology by welding
//! corners with identical positions.
//!
//! # Format Detection
//!
//! The extension does not decide the encoding. The first
//! [`DETECTION_WINDOW`] bytes are inspected. A prefix holding any control
//! byte other than tab, line feed, form feed or carriage return is binary, as
//! is an empty one; anything else is read as text. The `solid` keyword is not
//! checked. A leading UTF-8 byte order mark is skipped.
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    – Header (ignored, often contains file info)
//! UINT32       – Number of triangles
//! foreach triangle
//!     REAL32[3] – Normal vector (often not accurate)
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (usually 0)
//! end
//! ```
//!
//! # ASCII Format
//!
//! ```text
//! solid name
//!   facet normal ni nj nk
//!     outer loop
//!       vertex v1x v1y v1z
//!       vertex v2x v2y v2z
//!       vertex v3x v3y v3z
//!     endloop
//!   endfacet
//!   ...
//! endsolid name
//! ```
//!
//! A text file may hold several `solid` blocks; each becomes its own mesh.
//!
//! # Welding
//!
//! Triangles are scanned in file order. The first occurrence of a position
//! appends a vertex with the next id; later occurrences reuse it. Positions
//! compare exactly, with `-0.0` equal to `0.0`. Reordering the input
//! triangles therefore renumbers the output vertices.

use std::io::{ErrorKind, Read, SeekFrom, Write};

use hashbrown::HashMap;
use mesh_types::MeshTopology;
use tracing::debug;

use crate::builder::{MeshBuilder, MeshHints};
use crate::error::{IoError, IoResult};
use crate::number::NumberFormat;
use crate::options::{ReadOptions, WriteOptions};
use crate::registry::{MeshFormatReader, MeshSource};
use crate::warnings::{WarningContext, Warnings};
use crate::writer::{face_normal, face_positions};

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
const TRIANGLE_SIZE: usize = 50;

/// Number of leading bytes inspected to tell text from binary STL.
pub const DETECTION_WINDOW: usize = 500;

const BYTE_ORDER_MARK: char = '\u{feff}';

type Corners = [[f64; 3]; 3];

/// STL handler for the registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct StlFormatReader;

impl MeshFormatReader for StlFormatReader {
    fn name(&self) -> &'static str {
        "stl"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["stl"]
    }

    fn read(
        &self,
        source: &mut dyn MeshSource,
        builder: &mut dyn MeshBuilder,
        options: &ReadOptions,
        warnings: &mut Warnings<'_>,
    ) -> IoResult<()> {
        let binary = detect_binary(source)?;
        debug!(binary, "detected STL encoding");

        let solids = if binary {
            vec![read_binary(source)?]
        } else {
            read_text(source, options.number_format, warnings)?
        };

        if solids.iter().all(Vec::is_empty) {
            return Err(IoError::garbage("no triangles in STL file"));
        }

        for triangles in solids.iter().filter(|t| !t.is_empty()) {
            build_welded(builder, triangles);
        }
        Ok(())
    }
}

/// Inspect the start of `source` and rewind it.
fn detect_binary(source: &mut dyn MeshSource) -> IoResult<bool> {
    let mut prefix = Vec::with_capacity(DETECTION_WINDOW);
    Read::take(&mut *source, DETECTION_WINDOW as u64).read_to_end(&mut prefix)?;
    source.seek(SeekFrom::Start(0))?;
    Ok(looks_binary(&prefix))
}

fn looks_binary(prefix: &[u8]) -> bool {
    prefix.is_empty()
        || prefix
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c))
}

/// Read all binary triangle records.
fn read_binary(source: &mut dyn MeshSource) -> IoResult<Vec<Corners>> {
    let mut header = [0u8; HEADER_SIZE + 4];
    read_record(source, &mut header).map_err(|e| match e {
        IoError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
            IoError::parsing("binary STL is shorter than its 84 byte header")
        }
        other => other,
    })?;
    let declared = u32::from_le_bytes([
        header[HEADER_SIZE],
        header[HEADER_SIZE + 1],
        header[HEADER_SIZE + 2],
        header[HEADER_SIZE + 3],
    ]);

    // Cap the reservation; the declared count is untrusted.
    let mut triangles = Vec::with_capacity((declared as usize).min(1 << 20));
    let mut record = [0u8; TRIANGLE_SIZE];
    for read in 0..declared {
        read_record(source, &mut record).map_err(|e| match e {
            IoError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => IoError::parsing(format!(
                "binary STL declares {declared} triangles but only {read} are present"
            )),
            other => other,
        })?;
        // Skip normal (12 bytes), read 3 vertices (36 bytes total)
        triangles.push([
            read_corner(&record[12..24]),
            read_corner(&record[24..36]),
            read_corner(&record[36..48]),
        ]);
    }
    Ok(triangles)
}

fn read_record(source: &mut dyn MeshSource, buf: &mut [u8]) -> IoResult<()> {
    source.read_exact(buf).map_err(IoError::from)
}

/// Read a corner from 12 bytes (3 f32s).
fn read_corner(buf: &[u8]) -> [f64; 3] {
    let x = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let y = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let z = f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    [f64::from(x), f64::from(y), f64::from(z)]
}

/// Read every solid of a text STL.
fn read_text(
    source: &mut dyn MeshSource,
    format: NumberFormat,
    warnings: &mut Warnings<'_>,
) -> IoResult<Vec<Vec<Corners>>> {
    let mut solids: Vec<Vec<Corners>> = Vec::new();
    let mut current: Option<Vec<Corners>> = None;
    let mut corners: Vec<[f64; 3]> = Vec::with_capacity(3);
    let mut in_loop = false;

    let mut line = String::new();
    let mut line_no = 0;
    loop {
        line.clear();
        if source.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;

        let text = if line_no == 1 {
            line.trim_start_matches(BYTE_ORDER_MARK)
        } else {
            line.as_str()
        };
        let parts: Vec<&str> = text.split_whitespace().collect();
        let Some(keyword) = parts.first() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "solid" => {
                if let Some(done) = current.replace(Vec::new()) {
                    solids.push(done);
                }
            }
            "endsolid" => {
                if let Some(done) = current.take() {
                    solids.push(done);
                }
            }
            "outer" => {
                in_loop = true;
                corners.clear();
            }
            "vertex" => {
                if in_loop && parts.len() >= 4 {
                    corners.push([
                        format.parse_f64(parts[1])?,
                        format.parse_f64(parts[2])?,
                        format.parse_f64(parts[3])?,
                    ]);
                }
            }
            "endloop" => in_loop = false,
            "endfacet" => {
                if let [a, b, c] = corners[..] {
                    current.get_or_insert_with(Vec::new).push([a, b, c]);
                } else {
                    warnings.emit_repeated(
                        "stl-facet",
                        format!("facet with {} vertices skipped", corners.len()),
                        Some(WarningContext::line(line_no)),
                    );
                }
                corners.clear();
            }
            _ => {}
        }
    }

    // Tolerate a missing trailing endsolid.
    if let Some(done) = current {
        solids.push(done);
    }
    Ok(solids)
}

/// Position key with `-0.0` folded into `0.0`.
fn weld_key(p: [f64; 3]) -> [u64; 3] {
    p.map(|c| (c + 0.0).to_bits())
}

/// Append one mesh, welding identical corner positions.
fn build_welded(builder: &mut dyn MeshBuilder, triangles: &[Corners]) {
    builder.begin_mesh(MeshHints::NONE);
    let mut ids: HashMap<[u64; 3], u32> = HashMap::with_capacity(triangles.len());
    for tri in triangles {
        let [a, b, c] = tri.map(|p| {
            *ids.entry(weld_key(p))
                .or_insert_with(|| builder.append_vertex(p[0], p[1], p[2]))
        });
        builder.append_triangle(a, b, c);
    }
    debug!(
        triangles = triangles.len(),
        vertices = ids.len(),
        "welded STL solid"
    );
}

/// Write meshes as STL.
///
/// Binary output merges all meshes into one triangle list; ASCII output writes
/// one `solid` per mesh.
///
/// # Errors
///
/// Returns an error if writing fails or a face references a missing vertex.
pub fn write_stl<M: MeshTopology, W: Write>(
    writer: &mut W,
    meshes: &[M],
    options: &WriteOptions,
) -> IoResult<()> {
    if options.binary {
        write_stl_binary(writer, meshes)
    } else {
        write_stl_ascii(writer, meshes, options.number_format)
    }
}

fn write_stl_binary<M: MeshTopology, W: Write>(writer: &mut W, meshes: &[M]) -> IoResult<()> {
    // Write 80-byte header (padded with spaces)
    let mut header = [b' '; HEADER_SIZE];
    let text = b"Binary STL generated by mesh-interchange";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;

    let total: usize = meshes.iter().map(MeshTopology::face_count).sum();
    let face_count = u32::try_from(total)
        .map_err(|_| IoError::invalid_input("binary STL holds at most u32::MAX triangles"))?;
    writer.write_all(&face_count.to_le_bytes())?;

    for mesh in meshes {
        for face in mesh.faces() {
            let corners = face_positions(mesh, face)?;
            for c in face_normal(&corners) {
                writer.write_all(&c.to_le_bytes())?;
            }
            for p in &corners {
                #[allow(clippy::cast_possible_truncation)]
                // Truncation: f64 to f32 is intentional for STL format
                for c in [p.x as f32, p.y as f32, p.z as f32] {
                    writer.write_all(&c.to_le_bytes())?;
                }
            }
            // Attribute byte count (0)
            writer.write_all(&0u16.to_le_bytes())?;
        }
    }
    Ok(())
}

fn write_stl_ascii<M: MeshTopology, W: Write>(
    writer: &mut W,
    meshes: &[M],
    format: NumberFormat,
) -> IoResult<()> {
    for (index, mesh) in meshes.iter().enumerate() {
        writeln!(writer, "solid mesh{index}")?;
        for face in mesh.faces() {
            let corners = face_positions(mesh, face)?;
            let [nx, ny, nz] = face_normal(&corners);
            writeln!(
                writer,
                "  facet normal {} {} {}",
                format.format(nx),
                format.format(ny),
                format.format(nz)
            )?;
            writeln!(writer, "    outer loop")?;
            for p in &corners {
                writeln!(
                    writer,
                    "      vertex {} {} {}",
                    format.format(p.x),
                    format.format(p.y),
                    format.format(p.z)
                )?;
            }
            writeln!(writer, "    endloop")?;
            writeln!(writer, "  endfacet")?;
        }
        writeln!(writer, "endsolid mesh{index}")?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::unnecessary_raw_string_hashes
)]
mod tests {
    use super::*;
    use crate::builder::IndexedMeshBuilder;
    use crate::error::IoCode;
    use mesh_types::{IndexedMesh, Vertex, unit_cube};
    use std::io::Cursor;

    fn read_bytes(bytes: &[u8]) -> IoResult<IndexedMeshBuilder> {
        let mut builder = IndexedMeshBuilder::new();
        StlFormatReader.read(
            &mut Cursor::new(bytes.to_vec()),
            &mut builder,
            &ReadOptions::default(),
            &mut Warnings::silent(),
        )?;
        Ok(builder)
    }

    fn create_test_triangle() -> IndexedMesh {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    #[test]
    fn ascii_stl_parsing() {
        let ascii_stl = br#"solid test
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
endsolid test"#;

        let builder = read_bytes(ascii_stl).unwrap();
        let mesh = &builder.meshes()[0];
        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn welding_follows_first_occurrence() {
        // Two triangles sharing the edge (1,0,0)-(0,1,0).
        let text = b"solid quad
facet normal 0 0 1
outer loop
vertex 0 0 0
vertex 1 0 0
vertex 0 1 0
endloop
endfacet
facet normal 0 0 1
outer loop
vertex 1 0 0
vertex 1 1 0
vertex 0 1 0
endloop
endfacet
endsolid quad
";
        let builder = read_bytes(text).unwrap();
        let mesh = &builder.meshes()[0];
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [1, 3, 2]]);
        assert_eq!(mesh.vertices[3].position.x, 1.0);
        assert_eq!(mesh.vertices[3].position.y, 1.0);
    }

    #[test]
    fn negative_zero_welds_with_zero() {
        assert_eq!(weld_key([-0.0, 1.0, 2.0]), weld_key([0.0, 1.0, 2.0]));
        assert_ne!(weld_key([1e-12, 1.0, 2.0]), weld_key([0.0, 1.0, 2.0]));
    }

    #[test]
    fn detection() {
        assert!(!looks_binary(b"solid cube\nfacet normal 0 0 1\n"));
        assert!(!looks_binary(b"  \n solid"));
        assert!(!looks_binary(b"SOLID cube\r\n"));
        assert!(!looks_binary(b"\xef\xbb\xbfsolid cube\n"));
        assert!(looks_binary(b"solid\0\0\0\x01"));
        assert!(looks_binary(b""));
    }

    #[test]
    fn uppercase_keywords_read_as_text() {
        let text = b"SOLID CUBE
FACET NORMAL 0 0 1
OUTER LOOP
VERTEX 0 0 0
VERTEX 1 0 0
VERTEX 0 1 0
ENDLOOP
ENDFACET
ENDSOLID CUBE
";
        let builder = read_bytes(text).unwrap();
        assert_eq!(builder.meshes().len(), 1);
        assert_eq!(builder.meshes()[0].face_count(), 1);
        assert_eq!(builder.meshes()[0].vertex_count(), 3);
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let mut bytes = b"\xef\xbb\xbf".to_vec();
        bytes.extend_from_slice(
            b"solid cube
facet normal 0 0 1
outer loop
vertex 0 0 0
vertex 1 0 0
vertex 0 1 0
endloop
endfacet
endsolid cube
",
        );
        let builder = read_bytes(&bytes).unwrap();
        assert_eq!(builder.meshes().len(), 1);
        assert_eq!(builder.meshes()[0].face_count(), 1);
    }

    #[test]
    fn binary_header_starting_with_solid() {
        let mut bytes = Vec::new();
        let mut header = [0u8; HEADER_SIZE];
        header[..5].copy_from_slice(b"solid");
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 12]);
        for c in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());

        let builder = read_bytes(&bytes).unwrap();
        assert_eq!(builder.meshes()[0].face_count(), 1);
        assert_eq!(builder.meshes()[0].vertex_count(), 3);
    }

    #[test]
    fn truncated_binary_is_parsing_error() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; TRIANGLE_SIZE]);
        let err = read_bytes(&bytes).unwrap_err();
        assert_eq!(err.code(), IoCode::FileParsingError);
        assert!(err.to_string().contains("only 1"));

        let err = read_bytes(&[0u8; 10]).unwrap_err();
        assert_eq!(err.code(), IoCode::FileParsingError);
    }

    #[test]
    fn empty_solid_is_garbage() {
        let err = read_bytes(b"solid empty\nendsolid empty\n").unwrap_err();
        assert_eq!(err.code(), IoCode::GarbageDataError);

        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let err = read_bytes(&bytes).unwrap_err();
        assert_eq!(err.code(), IoCode::GarbageDataError);
    }

    #[test]
    fn one_mesh_per_solid() {
        let mut out = Vec::new();
        let meshes = [create_test_triangle(), unit_cube()];
        write_stl(&mut out, &meshes, &WriteOptions::ascii()).unwrap();

        let builder = read_bytes(&out).unwrap();
        assert_eq!(builder.meshes().len(), 2);
        assert_eq!(builder.meshes()[0].vertex_count(), 3);
        assert_eq!(builder.meshes()[1].vertex_count(), 8);
        assert_eq!(builder.meshes()[1].face_count(), 12);
    }

    #[test]
    fn binary_roundtrip_merges_meshes() {
        let mut out = Vec::new();
        let meshes = [unit_cube()];
        write_stl(&mut out, &meshes, &WriteOptions::default()).unwrap();
        assert_eq!(out.len(), HEADER_SIZE + 4 + 12 * TRIANGLE_SIZE);

        let builder = read_bytes(&out).unwrap();
        let mesh = &builder.meshes()[0];
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
    }

    #[test]
    fn facet_with_missing_corner_warns() {
        let text = b"solid t
facet normal 0 0 1
outer loop
vertex 0 0 0
vertex 1 0 0
endloop
endfacet
facet normal 0 0 1
outer loop
vertex 0 0 0
vertex 1 0 0
vertex 0 1 0
endloop
endfacet
endsolid t
";
        let mut builder = IndexedMeshBuilder::new();
        let mut warnings = Warnings::silent();
        StlFormatReader
            .read(
                &mut Cursor::new(text.to_vec()),
                &mut builder,
                &ReadOptions::default(),
                &mut warnings,
            )
            .unwrap();
        assert_eq!(warnings.emitted(), 1);
        assert_eq!(builder.meshes()[0].face_count(), 1);
    }
}

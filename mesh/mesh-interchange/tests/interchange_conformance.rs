//! End-to-end behaviour of the reader registry and the format writers.
//!
//! Each test drives the public API only: files are written to a temporary
//! directory, read back through [`StandardMeshReader`] or the convenience
//! loaders, and the resulting meshes are compared to the expected topology.
//!
//! To run: cargo test -p mesh-interchange --test interchange_conformance

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use mesh_interchange::{
    IndexedMeshBuilder, IoCode, Material, MeshBuilder, MeshFormat, MeshHints, NewVertexInfo,
    ReadOptions, ReadResult, StandardMeshReader, WriteOptions, load_mesh, load_meshes,
    save_meshes, write_meshes,
};
use mesh_types::{IndexedMesh, MeshTopology, Vertex, VertexAttributes, VertexColor, unit_cube};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const TWO_MATERIAL_OBJ: &str = "\
mtllib shades.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl matte
f 1/1/1 2/2/1 3/3/1
usemtl gloss
f 1/1/1 3/3/1 4/4/1
f 3/3/1 4/4/1 2/2/1
";

const SHADES_MTL: &str = "\
newmtl matte
Kd 0.2 0.2 0.2
Ns 1
newmtl gloss
Kd 0.9 0.9 0.9
Ns 200
";

/// Three facets over six distinct corners; the second and third facets
/// reuse corners of the first.
const SHARED_CORNER_STL: &str = "\
solid shared
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
facet normal 0 0 1
outer loop
vertex 2 0 0
vertex 2 1 0
vertex 0 0 0
endloop
endfacet
endsolid shared
";

fn read_text(extension: &str, text: &str) -> (Result<Vec<IndexedMesh>, IoCode>, usize) {
    let mut reader = StandardMeshReader::new();
    let result = reader.read(
        &mut Cursor::new(text.as_bytes().to_vec()),
        extension,
        &ReadOptions::without_materials(),
    );
    let warnings = result.as_ref().map_or(0, |s| s.warnings);
    let meshes = reader.take_builder().expect("builder").into_meshes();
    (result.map(|_| meshes).map_err(|e| e.code()), warnings)
}

// =============================================================================
// OBJ
// =============================================================================

#[test]
fn test_obj_materials_split_meshes() {
    let dir = tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join("shades.mtl"), SHADES_MTL).unwrap();
    let path = dir.path().join("quad.obj");
    std::fs::write(&path, TWO_MATERIAL_OBJ).unwrap();

    let mut reader = StandardMeshReader::new();
    let summary = reader
        .read_path(&path, &ReadOptions::default())
        .expect("obj should load");
    assert_eq!(summary.format, "obj");
    assert_eq!(summary.meshes, 2);
    assert_eq!(summary.triangles, 3);
    assert_eq!(summary.warnings, 0);

    let builder = reader.take_builder().expect("builder");
    let meshes = builder.meshes();
    assert_eq!(meshes[0].vertex_count(), 3);
    assert_eq!(meshes[1].vertex_count(), 4);
    assert_eq!(meshes[1].faces, vec![[0, 1, 2], [1, 2, 3]]);
    assert_eq!(meshes[1].vertices[3].uv(), Some((1.0, 0.0)));
    assert!(meshes.iter().flat_map(|m| &m.vertices).all(|v| v.normal().is_some()));

    let matte = builder.material_of(0).expect("matte assigned");
    let gloss = builder.material_of(1).expect("gloss assigned");
    assert_eq!(matte.name, "matte");
    assert_eq!(gloss.shininess, Some(200.0));
}

#[test]
fn test_obj_single_group_keeps_file_order() {
    let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3\nf -4 -2 -1\n";
    let (meshes, warnings) = read_text("obj", text);
    let meshes = meshes.unwrap();
    assert_eq!(warnings, 0);
    assert_eq!(meshes.len(), 1);
    assert_eq!(meshes[0].vertex_count(), 4);
    assert_eq!(meshes[0].faces, vec![[0, 1, 2], [0, 2, 3]]);
}

#[test]
fn test_obj_missing_library_only_warns() {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join("quad.obj");
    std::fs::write(&path, TWO_MATERIAL_OBJ).unwrap();

    let mut reader = StandardMeshReader::new();
    let summary = reader.read_path(&path, &ReadOptions::default()).unwrap();
    // Missing library, then two unknown usemtl names.
    assert_eq!(summary.warnings, 3);
    let builder = reader.take_builder().unwrap();
    assert!(builder.materials().is_empty());
}

// =============================================================================
// STL
// =============================================================================

#[test]
fn test_stl_ascii_welds_shared_corners() {
    let (meshes, _) = read_text("stl", SHARED_CORNER_STL);
    let meshes = meshes.unwrap();
    assert_eq!(meshes.len(), 1);
    let mesh = &meshes[0];
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.faces, vec![[0, 1, 2], [1, 3, 2], [4, 5, 0]]);
}

#[test]
fn test_stl_binary_roundtrip_welds() {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join("cube.stl");
    save_meshes(&[unit_cube()], &path, &WriteOptions::default()).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 80 + 4 + 12 * 50);

    let mesh = load_mesh(&path).expect("failed to reload");
    assert_eq!(mesh.vertex_count(), 8);
    assert_eq!(mesh.face_count(), 12);
}

// =============================================================================
// Garbage and structural errors
// =============================================================================

#[test]
fn test_empty_inputs_are_garbage() {
    for (extension, text) in [
        ("obj", "# no geometry\n"),
        ("stl", "solid empty\nendsolid empty\n"),
        ("off", "OFF\n0 0 0\n"),
    ] {
        let (result, _) = read_text(extension, text);
        assert_eq!(result.unwrap_err(), IoCode::GarbageDataError, "{extension}");
    }
}

#[test]
fn test_structural_errors() {
    let (result, _) = read_text("off", "OFF\n4 1 0\n0 0 0\n1 0 0\n");
    assert_eq!(result.unwrap_err(), IoCode::FileParsingError);

    let (result, _) = read_text("obj", "v 0 0 0\nf 0 1 1\n");
    assert_eq!(result.unwrap_err(), IoCode::FileParsingError);

    let (result, _) = read_text("meshbin", "abc");
    assert_eq!(result.unwrap_err(), IoCode::FileParsingError);
}

#[test]
fn test_read_result_codes() {
    let mut reader = StandardMeshReader::new();
    let result: ReadResult = reader
        .read(&mut Cursor::new(b"solid x\nendsolid x\n".to_vec()), "stl", &ReadOptions::default())
        .into();
    assert!(!result.is_ok());
    assert_eq!(result.code, IoCode::GarbageDataError);
    assert!(!result.message.is_empty());

    let result: ReadResult = reader
        .read(&mut Cursor::new(Vec::new()), "dxf", &ReadOptions::default())
        .into();
    assert_eq!(result.code, IoCode::UnknownFormatError);

    let result: ReadResult = reader
        .read_path("no_extension", &ReadOptions::default())
        .into();
    assert_eq!(result.code, IoCode::InvalidFilenameError);
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn test_warnings_reach_callback() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut reader = StandardMeshReader::new();
    reader.on_warning(move |w| sink.lock().unwrap().push(w.message.clone()));

    let text = "OFF\n3 1 0\n0 0 0 9\n1 0 0\n0 1 0\n3 0 1 2\n";
    let summary = reader
        .read(&mut Cursor::new(text.as_bytes().to_vec()), "off", &ReadOptions::default())
        .unwrap();
    assert_eq!(summary.warnings, 1);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_successive_reads_append() {
    let mut reader = StandardMeshReader::new();
    let text = "OFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n";
    for _ in 0..2 {
        reader
            .read(&mut Cursor::new(text.as_bytes().to_vec()), "OFF", &ReadOptions::default())
            .unwrap();
    }
    assert_eq!(reader.builder().unwrap().meshes().len(), 2);
}

#[tokio::test]
async fn test_async_read_and_cancel() {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join("cube.off");
    save_meshes(&[unit_cube()], &path, &WriteOptions::default()).unwrap();

    let mut reader = StandardMeshReader::new();
    let token = CancellationToken::new();
    let summary = reader
        .read_path_async(&path, &ReadOptions::default(), &token)
        .await
        .unwrap();
    assert_eq!(summary.vertices, 8);

    token.cancel();
    let err = reader
        .read_path_async(&path, &ReadOptions::default(), &token)
        .await
        .unwrap_err();
    assert_eq!(err.code(), IoCode::Cancelled);
    assert_eq!(reader.builder().unwrap().meshes().len(), 1);
}

/// Fires its token once the first vertex is appended, so cancellation lands
/// in the middle of a parse.
struct CancelOnFirstVertex {
    inner: IndexedMeshBuilder,
    token: CancellationToken,
}

impl MeshBuilder for CancelOnFirstVertex {
    fn begin_mesh(&mut self, hints: MeshHints) -> usize {
        self.inner.begin_mesh(hints)
    }

    fn append_vertex(&mut self, x: f64, y: f64, z: f64) -> u32 {
        self.token.cancel();
        self.inner.append_vertex(x, y, z)
    }

    fn append_vertex_info(&mut self, info: &NewVertexInfo) -> u32 {
        self.token.cancel();
        self.inner.append_vertex_info(info)
    }

    fn append_triangle(&mut self, a: u32, b: u32, c: u32) -> u32 {
        self.inner.append_triangle(a, b, c)
    }

    fn build_material(&mut self, material: &Material) -> usize {
        self.inner.build_material(material)
    }

    fn assign_material(&mut self, material_id: usize, mesh_id: usize) {
        self.inner.assign_material(material_id, mesh_id);
    }
}

#[tokio::test]
async fn test_async_cancel_mid_parse() {
    let mut text = Vec::new();
    write_meshes(&mut text, MeshFormat::Off, &[unit_cube()], &WriteOptions::default()).unwrap();

    let token = CancellationToken::new();
    let mut reader = StandardMeshReader::with_builder(CancelOnFirstVertex {
        inner: IndexedMeshBuilder::new(),
        token: token.clone(),
    });
    let mut source: &[u8] = &text;
    let err = reader
        .read_async(&mut source, "off", &ReadOptions::default(), &token)
        .await
        .unwrap_err();
    assert_eq!(err.code(), IoCode::Cancelled);

    // Parsing stopped at the line after the first vertex.
    let builder = reader.take_builder().unwrap();
    assert_eq!(builder.inner.meshes()[0].vertex_count(), 1);
    assert_eq!(builder.inner.meshes()[0].face_count(), 0);
}

// =============================================================================
// Writers
// =============================================================================

fn colored_triangle() -> IndexedMesh {
    let mut mesh = IndexedMesh::new();
    for (p, color) in [
        ([0.0, 0.0, 0.0], VertexColor::RED),
        ([1.0, 0.0, 0.0], VertexColor::WHITE),
        ([0.0, 1.0, 0.0], VertexColor::new(0.0, 0.0, 1.0)),
    ] {
        mesh.vertices.push(Vertex::with_attributes(
            p.into(),
            VertexAttributes {
                color: Some(color),
                uv: Some((0.25, 0.75)),
                ..VertexAttributes::empty()
            },
        ));
    }
    mesh.faces.push([0, 1, 2]);
    mesh
}

#[test]
fn test_obj_attributes_roundtrip() {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join("tri.obj");
    save_meshes(&[colored_triangle()], &path, &WriteOptions::default()).unwrap();

    let mesh = load_mesh(&path).unwrap();
    assert_eq!(mesh.vertices[0].color(), Some(VertexColor::RED));
    let (u, v) = mesh.vertices[2].uv().unwrap();
    assert_relative_eq!(u, 0.25);
    assert_relative_eq!(v, 0.75);
}

#[test]
fn test_container_roundtrip() {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join(format!("set.{}", MeshFormat::Container.extension()));
    let meshes = vec![
        unit_cube(),
        colored_triangle(),
        IndexedMesh::new(),
        unit_cube(),
    ];
    save_meshes(&meshes, &path, &WriteOptions::default()).unwrap();

    let loaded = load_meshes(&path).unwrap();
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded[1].vertices, meshes[1].vertices);
    assert!(loaded[2].is_empty());
}

#[test]
fn test_container_rejects_wrong_count() {
    let mut out = Vec::new();
    let err = write_meshes(
        &mut out,
        MeshFormat::Container,
        &[unit_cube()],
        &WriteOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), IoCode::InvalidInputError);
    assert!(out.is_empty());
}

#[test]
fn test_single_mesh_formats_reject_many() {
    let mut out = Vec::new();
    for format in [MeshFormat::Off, MeshFormat::Ply] {
        let err = write_meshes(
            &mut out,
            format,
            &[unit_cube(), unit_cube()],
            &WriteOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code(), IoCode::InvalidInputError, "{format:?}");
    }
}

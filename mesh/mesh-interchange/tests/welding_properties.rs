//! Property tests for vertex welding and index remapping.
//!
//! To run: cargo test -p mesh-interchange --test welding_properties

#![allow(clippy::unwrap_used, clippy::cast_precision_loss)]

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Cursor;

use mesh_interchange::{
    MeshFormat, ReadOptions, StandardMeshReader, WriteOptions, write_meshes,
};
use mesh_types::{IndexedMesh, MeshTopology, Vertex};
use proptest::prelude::*;

/// Corners drawn from a small lattice so that duplicates are common.
fn corner() -> impl Strategy<Value = [i8; 3]> {
    prop::array::uniform3(-2_i8..=2)
}

fn triangles() -> impl Strategy<Value = Vec<[[i8; 3]; 3]>> {
    prop::collection::vec(prop::array::uniform3(corner()), 1..40)
}

fn ascii_stl(triangles: &[[[i8; 3]; 3]]) -> String {
    let mut text = String::from("solid lattice\n");
    for tri in triangles {
        text.push_str("facet normal 0 0 0\nouter loop\n");
        for [x, y, z] in tri {
            writeln!(text, "vertex {x} {y} {z}").unwrap();
        }
        text.push_str("endloop\nendfacet\n");
    }
    text.push_str("endsolid lattice\n");
    text
}

fn read(bytes: Vec<u8>, extension: &str) -> Vec<IndexedMesh> {
    let mut reader = StandardMeshReader::new();
    reader
        .read(&mut Cursor::new(bytes), extension, &ReadOptions::default())
        .unwrap();
    reader.take_builder().unwrap().into_meshes()
}

fn position(mesh: &IndexedMesh, index: u32) -> [f64; 3] {
    let p = mesh.vertex(index as usize).unwrap().position;
    [p.x, p.y, p.z]
}

proptest! {
    #[test]
    fn stl_welds_to_distinct_positions(tris in triangles()) {
        let meshes = read(ascii_stl(&tris).into_bytes(), "stl");
        prop_assert_eq!(meshes.len(), 1);
        let mesh = &meshes[0];

        let distinct: HashSet<[i8; 3]> = tris.iter().flatten().copied().collect();
        prop_assert_eq!(mesh.vertex_count(), distinct.len());
        prop_assert_eq!(mesh.face_count(), tris.len());

        // Every triangle still addresses the positions it was written with.
        for (face, tri) in mesh.faces().zip(&tris) {
            for (&index, corner) in face.iter().zip(tri) {
                let expected = corner.map(f64::from);
                prop_assert_eq!(position(mesh, index), expected);
            }
        }
    }

    #[test]
    fn welding_is_idempotent(tris in triangles()) {
        let first = read(ascii_stl(&tris).into_bytes(), "stl");
        let mut binary = Vec::new();
        write_meshes(&mut binary, MeshFormat::Stl, &first, &WriteOptions::default()).unwrap();
        let second = read(binary, "stl");
        prop_assert_eq!(&first[0].faces, &second[0].faces);
        prop_assert_eq!(first[0].vertex_count(), second[0].vertex_count());
    }

    #[test]
    fn off_keeps_vertex_order(coords in prop::collection::vec(corner(), 3..30)) {
        let mut mesh = IndexedMesh::new();
        for [x, y, z] in &coords {
            mesh.vertices.push(Vertex::from_coords(f64::from(*x), f64::from(*y), f64::from(*z)));
        }
        let last = u32::try_from(coords.len() - 1).unwrap();
        mesh.faces.push([0, 1, last]);

        let mut text = Vec::new();
        write_meshes(&mut text, MeshFormat::Off, &[mesh.clone()], &WriteOptions::default()).unwrap();
        let read_back = read(text, "off");
        prop_assert_eq!(&read_back[0].vertices, &mesh.vertices);
        prop_assert_eq!(&read_back[0].faces, &mesh.faces);
    }
}
